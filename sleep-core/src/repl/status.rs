//! Shared status rendering for the console `status` command.
//!
//! [`StatusFormatter`] keeps the textual layout identical between the firmware
//! console and the emulator.

use core::fmt;

use crate::machine::SleepSnapshot;

/// Helper that renders a [`SleepSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a SleepSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a SleepSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the link line (e.g. `link state=awake proto=1 asleep=0 epoch=3`).
    pub fn write_link_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "link state={} proto={} asleep={} epoch={}",
            self.snapshot.state,
            u8::from(self.snapshot.protocol_enabled()),
            u8::from(self.snapshot.asleep()),
            self.snapshot.epoch.raw()
        )
    }

    /// Writes the wake-line levels (e.g. `lines ext_wake=1 host_wake=0`).
    pub fn write_lines_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "lines ext_wake={} host_wake={}",
            u8::from(self.snapshot.ext_wake),
            u8::from(self.snapshot.host_wake)
        )
    }

    /// Writes the activity line (e.g. `activity tx_frames=2 timer=armed transport=attached`).
    pub fn write_activity_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "activity tx_frames={}", self.snapshot.tx_frames)?;
        writer.write_str(" timer=")?;
        writer.write_str(if self.snapshot.timer_armed {
            "armed"
        } else {
            "idle"
        })?;
        writer.write_str(" transport=")?;
        writer.write_str(if self.snapshot.transport_attached {
            "attached"
        } else {
            "none"
        })
    }

    /// Writes all status lines, each terminated by `\n`.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_link_line(writer)?;
        writer.write_char('\n')?;
        self.write_lines_line(writer)?;
        writer.write_char('\n')?;
        self.write_activity_line(writer)?;
        writer.write_char('\n')
    }
}
