use embassy_stm32::exti::ExtiInput;

use super::{CONTEXT, HOST_WAKE_GATE};

/// Watches the host-wake input and forwards edges while the protocol is
/// registered. Only posts work; the sleep worker runs the wake path.
#[embassy_executor::task]
pub async fn run(mut host_wake: ExtiInput<'static>) -> ! {
    loop {
        host_wake.wait_for_any_edge().await;
        defmt::trace!("host-wake: edge, level {}", host_wake.is_high());

        if HOST_WAKE_GATE.accepts() {
            CONTEXT.on_host_wake_irq();
        }
    }
}
