//! Host-side emulator for the Bluetooth sleep coordinator.
//!
//! Wires `bluesleep-core` to a simulated board with a virtual clock so the
//! console, wake lines, and activity timer can be exercised without hardware.

pub mod board;
pub mod cli;
pub mod session;
pub mod sim;
