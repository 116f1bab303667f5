//! SamsEmung Common - emulator control library
//!
//! Builds QEMU command lines, supervises the emulator process, manages the
//! kernel/recovery image library and VM profiles, and scrapes device facts
//! out of extracted firmware dumps.

pub mod config;
pub mod device;
pub mod dump;
pub mod error;
pub mod kernel;
pub mod library;
pub mod paths;
pub mod qemu;
pub mod vm;

pub use config::Settings;
pub use device::{Architecture, DeviceModel};
pub use dump::{analyze_dump, DumpAnalysis, DumpAnalyzer, KernelPresence};
pub use error::{EmungError, Result};
pub use kernel::{validate_kernel, KernelImageKind};
pub use library::ImageLibrary;
pub use paths::DataDirs;
pub use qemu::{EmulatorController, QemuCommand};
pub use vm::{VmProfile, VmStore};
