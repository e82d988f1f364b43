#![no_std]

// Sleep/wake coordination for a Bluetooth controller attached over UART.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Board crates implement the collaborator traits in
// `hal` and drive a shared `WakeContext` from their interrupt, worker, and
// timer contexts.

pub mod config;
pub mod context;
pub mod error;
pub mod hal;
pub mod hci;
pub mod machine;
pub mod repl;
pub mod telemetry;

pub use config::SleepConfig;
pub use context::WakeContext;
pub use error::SleepError;
pub use machine::{Epoch, LinkState, TimerTicket, WakeStateMachine};
