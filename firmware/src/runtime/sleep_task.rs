use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Timer};

use super::CONTEXT;
use crate::telemetry::LogPump;

const LOG_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Deferred host-wake worker. Also mirrors new sleep events to the log.
#[embassy_executor::task]
pub async fn run() -> ! {
    let mut pump = LogPump::new();

    loop {
        match select(CONTEXT.next_host_wake(), Timer::after(LOG_POLL_INTERVAL)).await {
            Either::First(epoch) => {
                let outcome = CONTEXT.handle_host_wake(epoch);
                defmt::debug!("bluesleep: host-wake {}", defmt::Debug2Format(&outcome));
            }
            Either::Second(()) => {}
        }
        pump.pump(&CONTEXT);
    }
}
