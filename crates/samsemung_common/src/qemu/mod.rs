//! QEMU integration: argv building, process supervision and the monitor

pub mod command;
pub mod controller;
pub mod process;
#[cfg(unix)]
pub mod qmp;

pub use command::QemuCommand;
pub use controller::{EmulatorController, StartMode, StartOutcome};
pub use process::{RunRegistry, RunState, RunStatus};
