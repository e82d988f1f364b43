use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use bluesleep_emulator::board::SimBoard;
use bluesleep_emulator::cli::{self, USAGE};
use bluesleep_emulator::session::{Session, TranscriptLogger};

fn main() -> io::Result<()> {
    let options = cli::parse(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = Session::new(SimBoard::new(options.pins), options.config);
    if let Some(path) = options.transcript.as_deref() {
        session = session.with_transcript(TranscriptLogger::create(path, "interactive")?);
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Bluesleep emulator ready (interval {:?}, host_wake gpio{}, ext_wake gpio{}). \
         Type `help` for commands or `exit` to quit.",
        options.config.tx_interval(),
        options.pins.host_wake,
        options.pins.ext_wake,
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}
