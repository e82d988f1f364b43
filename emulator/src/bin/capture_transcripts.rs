//! Replays the reference sleep scenarios and writes their transcripts under
//! `transcripts/`.

use std::io;
use std::path::Path;

use bluesleep_core::config::SleepConfig;
use bluesleep_emulator::board::{PinMap, SimBoard};
use bluesleep_emulator::session::{Session, TranscriptLogger};

const SCENARIOS: [(&str, &str, &[&str]); 5] = [
    (
        "idle-sleep",
        "protocol start, idle interval, sleep",
        &["attach", "echo 1 > proto", "cat btwake", "advance 6s", "cat asleep", "board"],
    ),
    (
        "outgoing-wake",
        "outgoing data wakes a sleeping link",
        &["attach", "echo 1 > proto", "advance 6s", "send 12", "cat asleep", "advance 6s", "advance 6s", "cat asleep"],
    ),
    (
        "busy-uart",
        "buffered bytes keep the link awake",
        &["attach", "echo 1 > proto", "queue 12", "advance 6s", "cat asleep", "flush", "advance 6s", "cat asleep"],
    ),
    (
        "stop-from-sleep",
        "stopping a sleeping link restores the UART",
        &["attach", "echo 1 > proto", "advance 6s", "echo 0 > proto", "cat proto", "board", "advance 500ms", "board"],
    ),
    (
        "host-wake",
        "controller-initiated wake through the deferred worker",
        &["attach", "echo 1 > proto", "advance 6s", "hostwake 1", "cat hostwake", "hostwake 0", "advance 6s", "log"],
    ),
];

fn main() -> io::Result<()> {
    for (name, title, script) in SCENARIOS {
        let path = Path::new("transcripts").join(format!("{name}.log"));
        let transcript = TranscriptLogger::create(&path, title)?;
        let mut session =
            Session::new(SimBoard::new(PinMap::DEFAULT), SleepConfig::DEFAULT).with_transcript(transcript);
        for line in script {
            session.handle_command(line)?;
        }
        println!("wrote {}", path.display());
    }
    Ok(())
}
