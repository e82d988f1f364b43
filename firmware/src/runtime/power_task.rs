use embassy_time::Timer;

use super::{IDLE, POWER};
use crate::hw::timer::to_embassy;

/// Carries out deferred power releases.
#[embassy_executor::task]
pub async fn run() -> ! {
    loop {
        let release = POWER.next_release().await;
        Timer::after(to_embassy(release.after)).await;
        if POWER.complete(release) {
            let mode = IDLE.refresh();
            defmt::debug!("power: reference released, idle {}", defmt::Debug2Format(&mode));
        }
    }
}
