//! Sleep event log forwarding.
//!
//! The coordinator keeps its own bounded event ring. [`LogPump`] remembers how
//! far it has read and mirrors new records to defmt on target and stdout on
//! the host so state changes show up during bring-up without polling the
//! console.

use bluesleep_core::context::{LOG_DRAIN_BATCH, WakeContext};
use bluesleep_core::telemetry::{LogCursor, SleepRecord};
use heapless::Vec;

/// Incremental reader over the coordinator event log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPump {
    cursor: LogCursor,
}

impl LogPump {
    pub const fn new() -> Self {
        Self {
            cursor: LogCursor::new(),
        }
    }

    /// Emits every record newer than the last pump, returning how many were sent.
    pub fn pump<G, Tm, P, T, I>(&mut self, ctx: &WakeContext<G, Tm, P, T, I>) -> usize {
        let mut emitted = 0;
        loop {
            let batch: Vec<SleepRecord, LOG_DRAIN_BATCH> = ctx.drain_log(&mut self.cursor);
            for record in &batch {
                emit_record(record);
            }
            emitted += batch.len();
            if batch.len() < LOG_DRAIN_BATCH {
                return emitted;
            }
        }
    }
}

fn emit_record(record: &SleepRecord) {
    if record.event.is_warning() {
        log_warn(record);
    } else {
        log_info(record);
    }
}

#[cfg(target_os = "none")]
fn log_info(record: &SleepRecord) {
    defmt::info!("bluesleep: {}", defmt::Display2Format(record));
}

#[cfg(target_os = "none")]
fn log_warn(record: &SleepRecord) {
    defmt::warn!("bluesleep: {}", defmt::Display2Format(record));
}

#[cfg(not(target_os = "none"))]
fn log_info(record: &SleepRecord) {
    println!("bluesleep: {record}");
}

#[cfg(not(target_os = "none"))]
fn log_warn(record: &SleepRecord) {
    println!("bluesleep: warning: {record}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesleep_core::config::SleepConfig;
    use bluesleep_core::hal::{NoopHostWakeIrq, NoopPowerReference};

    use crate::hw::{BoardGpio, BridgeUart, LineMirror, SignalTimer, TimerCommands, UartGate};
    use embassy_sync::signal::Signal;

    #[test]
    fn pump_emits_each_record_once() {
        static LINES: LineMirror = LineMirror::new();
        static TIMER: TimerCommands = Signal::new();
        static GATE: UartGate = UartGate::new();
        let ctx = WakeContext::new(
            BoardGpio::new(&LINES, || false),
            SignalTimer::new(&TIMER),
            NoopPowerReference,
            NoopHostWakeIrq,
            SleepConfig::DEFAULT,
        );
        assert!(ctx.attach_transport(BridgeUart::new(&GATE)).is_ok());
        ctx.start().expect("start");

        let mut pump = LogPump::new();
        assert_eq!(pump.pump(&ctx), 2);
        assert_eq!(pump.pump(&ctx), 0);

        ctx.stop();
        assert_eq!(pump.pump(&ctx), 1);
    }
}
