use embassy_futures::select::{Either, select};
use embassy_time::Timer;

use super::{CONTEXT, TIMER_COMMANDS};
use crate::hw::TimerCommand;
use crate::hw::timer::to_embassy;

/// Owns the activity timer. A command arriving while armed replaces the
/// pending expiry.
#[embassy_executor::task]
pub async fn run() -> ! {
    let mut command = TIMER_COMMANDS.wait().await;

    loop {
        command = match command {
            TimerCommand::Cancel => TIMER_COMMANDS.wait().await,
            TimerCommand::Arm { after, ticket } => {
                match select(Timer::after(to_embassy(after)), TIMER_COMMANDS.wait()).await {
                    Either::First(()) => {
                        CONTEXT.on_timer_expiry(ticket);
                        // Expiry usually re-arms; pick that up or wait for the next command.
                        TIMER_COMMANDS.wait().await
                    }
                    Either::Second(next) => next,
                }
            }
        };
    }
}
