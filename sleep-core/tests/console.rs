mod common;

use bluesleep_core::error::{InputError, SleepError};
use bluesleep_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use bluesleep_core::repl::endpoints::{self, Endpoint};
use common::{Board, attached_context, fire_timer};

fn read(ctx: &common::TestContext, endpoint: Endpoint) -> String {
    let mut out = String::new();
    endpoints::read_endpoint(ctx, endpoint, &mut out).expect("render");
    out
}

#[test]
fn endpoints_render_exact_formats() {
    let board = Board::new();
    let ctx = attached_context(&board);

    assert_eq!(read(&ctx, Endpoint::BtWake), "btwake:0\n");
    assert_eq!(read(&ctx, Endpoint::HostWake), "hostwake: 0\n");
    assert_eq!(read(&ctx, Endpoint::Proto), "proto: 0\n");
    assert_eq!(read(&ctx, Endpoint::Asleep), "asleep: 0\n");

    ctx.start().expect("start");
    board.set_host_wake(true);
    assert_eq!(read(&ctx, Endpoint::BtWake), "btwake:1\n");
    assert_eq!(read(&ctx, Endpoint::HostWake), "hostwake: 1\n");
    assert_eq!(read(&ctx, Endpoint::Proto), "proto: 1\n");

    board.set_host_wake(false);
    fire_timer(&board, &ctx);
    assert_eq!(read(&ctx, Endpoint::Asleep), "asleep: 1\n");
}

#[test]
fn proto_writes_drive_the_lifecycle() {
    let board = Board::new();
    let ctx = attached_context(&board);

    assert_eq!(endpoints::write_endpoint(&ctx, Endpoint::Proto, b"1\n"), Ok(2));
    assert!(ctx.is_started());
    assert_eq!(
        endpoints::write_endpoint(&ctx, Endpoint::Proto, b"1"),
        Err(SleepError::Busy)
    );
    assert_eq!(endpoints::write_endpoint(&ctx, Endpoint::Proto, b"0"), Ok(1));
    assert!(!ctx.is_started());
}

#[test]
fn rejected_writes_leave_state_untouched() {
    let board = Board::new();
    let ctx = attached_context(&board);
    let before = ctx.snapshot();

    assert_eq!(
        endpoints::write_endpoint(&ctx, Endpoint::Proto, b""),
        Err(SleepError::InvalidInput(InputError::Empty))
    );
    assert_eq!(
        endpoints::write_endpoint(&ctx, Endpoint::BtWake, b"7"),
        Err(SleepError::InvalidInput(InputError::Unrecognized(b'7')))
    );
    assert_eq!(
        endpoints::write_endpoint(&ctx, Endpoint::HostWake, b"1"),
        Err(SleepError::InvalidInput(InputError::ReadOnly(Endpoint::HostWake)))
    );
    assert_eq!(ctx.snapshot(), before);
}

#[test]
fn btwake_write_bypasses_the_state_machine() {
    let board = Board::new();
    let ctx = attached_context(&board);

    endpoints::write_endpoint(&ctx, Endpoint::BtWake, b"1").expect("force");

    assert!(board.ext_wake());
    assert!(!ctx.snapshot().protocol_enabled());
    assert!(board.pending_ticket().is_none());
}

#[test]
fn console_session_round_trip() {
    let board = Board::new();
    let ctx = attached_context(&board);
    let executor = CommandExecutor::new(&ctx);
    let mut out = String::new();

    assert_eq!(
        executor.execute("echo 1 > proto", &mut out),
        Ok(CommandOutcome::Wrote {
            endpoint: Endpoint::Proto,
            consumed: 1,
        })
    );
    executor.execute("status", &mut out).expect("status");
    assert!(out.starts_with("link state=awake proto=1 asleep=0 epoch=1\n"));
    assert!(out.contains("lines ext_wake=1 host_wake=0\n"));

    out.clear();
    fire_timer(&board, &ctx);
    executor.execute("cat asleep", &mut out).expect("cat");
    assert_eq!(out, "asleep: 1\n");

    out.clear();
    let outcome = executor.execute("log", &mut out).expect("log");
    assert!(matches!(outcome, CommandOutcome::Log { records } if records >= 3));
    assert!(out.contains("entered-sleep"));

    assert!(matches!(
        executor.execute("echo > proto", &mut out),
        Err(CommandError::Sleep(SleepError::InvalidInput(InputError::Empty)))
    ));
}
