//! Sleep event log shared by firmware and host targets.
//!
//! The state machine records every decision it takes into a fixed-size ring so
//! firmware can forward them to `defmt` and the emulator can echo them into
//! transcripts. Records carry a monotonically increasing identifier; readers
//! keep a [`LogCursor`] and drain everything newer than the last id they saw.

use core::fmt;

use heapless::HistoryBuf;

use crate::hal::IrqError;
use crate::machine::{Epoch, TimerTicket};

/// Default number of records retained by [`SleepLog`].
pub const SLEEP_LOG_CAPACITY: usize = 32;

/// Identifier assigned to each record. Identifiers start at 1.
pub type RecordId = u32;

/// Why the activity timer was re-armed instead of letting the link idle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RearmReason {
    /// Frames were sent during the last interval.
    TxActivity,
    /// Sleep was allowed but the transport still buffers outbound bytes.
    TxPending,
    /// Ext-wake was still asserted on an awake link.
    ExtWakeHeld,
    /// Outgoing data arrived after the timer dropped ext-wake.
    TxResumed,
    /// The link is awake and no expiry was pending.
    Liveness,
}

impl fmt::Display for RearmReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RearmReason::TxActivity => "tx-activity",
            RearmReason::TxPending => "tx-pending",
            RearmReason::ExtWakeHeld => "ext-wake-held",
            RearmReason::TxResumed => "tx-resumed",
            RearmReason::Liveness => "liveness",
        };
        f.write_str(text)
    }
}

/// Discriminated events recorded by the state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SleepEvent {
    Started,
    StartFailed(IrqError),
    Stopped,
    EnteredSleep,
    Woke,
    TimerRearmed(RearmReason),
    TxIdle,
    RedundantSleep,
    StaleTimer(TimerTicket),
    StaleHostWake(Epoch),
    TransportAttached,
    TransportDetached,
    TransportRejected,
    ExtWakeForced(bool),
}

impl SleepEvent {
    /// Returns `true` for events that indicate unexpected input worth a warning.
    #[must_use]
    pub const fn is_warning(self) -> bool {
        matches!(
            self,
            SleepEvent::StartFailed(_) | SleepEvent::TransportRejected | SleepEvent::ExtWakeForced(_)
        )
    }
}

impl fmt::Display for SleepEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepEvent::Started => f.write_str("started"),
            SleepEvent::StartFailed(err) => write!(f, "start-failed ({err})"),
            SleepEvent::Stopped => f.write_str("stopped"),
            SleepEvent::EnteredSleep => f.write_str("entered-sleep"),
            SleepEvent::Woke => f.write_str("woke"),
            SleepEvent::TimerRearmed(reason) => write!(f, "timer-rearmed {reason}"),
            SleepEvent::TxIdle => f.write_str("tx-idle"),
            SleepEvent::RedundantSleep => f.write_str("redundant-sleep"),
            SleepEvent::StaleTimer(ticket) => write!(f, "stale-timer {}", ticket.raw()),
            SleepEvent::StaleHostWake(epoch) => write!(f, "stale-host-wake {}", epoch.raw()),
            SleepEvent::TransportAttached => f.write_str("transport-attached"),
            SleepEvent::TransportDetached => f.write_str("transport-detached"),
            SleepEvent::TransportRejected => f.write_str("transport-rejected"),
            SleepEvent::ExtWakeForced(level) => write!(f, "ext-wake-forced {}", u8::from(*level)),
        }
    }
}

/// Record stored in the sleep log ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SleepRecord {
    pub id: RecordId,
    /// Lifecycle epoch active when the event was recorded.
    pub epoch: Epoch,
    pub event: SleepEvent,
}

impl fmt::Display for SleepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [epoch {}] {}", self.id, self.epoch.raw(), self.event)
    }
}

/// Read position of a log consumer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LogCursor {
    last_seen: RecordId,
}

impl LogCursor {
    /// Creates a cursor that has seen nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { last_seen: 0 }
    }

    /// Creates a cursor positioned after record `id`.
    #[must_use]
    pub const fn at(id: RecordId) -> Self {
        Self { last_seen: id }
    }

    /// Identifier of the newest record consumed.
    #[must_use]
    pub const fn last_seen(&self) -> RecordId {
        self.last_seen
    }
}

/// Records sleep events into a fixed-size ring buffer.
pub struct SleepLog<const CAPACITY: usize = SLEEP_LOG_CAPACITY> {
    ring: HistoryBuf<SleepRecord, CAPACITY>,
    next_id: RecordId,
}

impl<const CAPACITY: usize> SleepLog<CAPACITY> {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_id: 1,
        }
    }

    /// Appends an event and returns its identifier.
    pub fn record(&mut self, epoch: Epoch, event: SleepEvent) -> RecordId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.ring.write(SleepRecord { id, epoch, event });
        id
    }

    /// Returns the most recent record, if available.
    pub fn latest(&self) -> Option<&SleepRecord> {
        self.ring.recent()
    }

    /// Returns the retained records in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &SleepRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns retained records newer than `cursor` and advances it.
    ///
    /// Records that were overwritten before the consumer caught up are skipped.
    pub fn drain_into<F>(&self, cursor: &mut LogCursor, mut sink: F) -> usize
    where
        F: FnMut(&SleepRecord),
    {
        let mut drained = 0;
        for record in self.oldest_first() {
            if !is_after(record.id, cursor.last_seen) {
                continue;
            }
            sink(record);
            cursor.last_seen = record.id;
            drained += 1;
        }
        drained
    }

    /// Returns `true` if any retained record matches `event`.
    pub fn contains(&self, event: SleepEvent) -> bool {
        self.oldest_first().any(|record| record.event == event)
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// Serial-number ordering so consumers keep up across an identifier wrap.
fn is_after(id: RecordId, last_seen: RecordId) -> bool {
    let distance = id.wrapping_sub(last_seen);
    distance != 0 && distance <= RecordId::MAX / 2
}

impl<const CAPACITY: usize> Default for SleepLog<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
