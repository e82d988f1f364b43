use embassy_futures::select::{Either, select};

use super::{CONSOLE_OPENED, CONTEXT, REPL_RX_QUEUE, REPL_TX_QUEUE};
use crate::repl::{ReplSession, Response, frames};

/// Runs console lines from CDC0 against the coordinator.
#[embassy_executor::task]
pub async fn run() -> ! {
    let rx = REPL_RX_QUEUE.receiver();
    let tx = REPL_TX_QUEUE.sender();
    let mut session = ReplSession::new(&CONTEXT);
    let mut response = Response::new();

    loop {
        let frame = match select(CONSOLE_OPENED.wait(), rx.receive()).await {
            Either::First(()) => {
                session.reset();
                continue;
            }
            Either::Second(frame) => frame,
        };

        for &byte in &frame {
            if let Err(err) = session.ingest(byte, &mut response) {
                defmt::warn!("repl: {}", defmt::Debug2Format(&err));
            }
        }

        for chunk in frames(&response) {
            tx.send(chunk).await;
        }
        response.clear();
    }
}
