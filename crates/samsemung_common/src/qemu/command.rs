//! QEMU argument lists
//!
//! Pure argv construction. Nothing here spawns a process; see
//! [`super::controller`] for that.

use crate::config::Settings;
use crate::device::{architecture_for, Architecture};
use crate::error::{EmungError, Result};
use crate::vm::VmProfile;
use std::path::{Path, PathBuf};

/// Memory used when a profile asks for 0 MiB
pub const DEFAULT_MEMORY_MB: u32 = 1024;

/// A program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QemuCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl QemuCommand {
    fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn pair(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// `qemu-img create -f qcow2 <path> <size>M`
    pub fn create_disk(settings: &Settings, path: &Path, size_mb: u64) -> Self {
        Self::new(tool_path(settings, "qemu-img"))
            .arg("create")
            .pair("-f", "qcow2")
            .arg(path.display().to_string())
            .arg(format!("{}M", size_mb))
    }

    /// Full launch command for a VM profile
    ///
    /// Fails when the virtual disk does not exist yet.
    pub fn launch(
        settings: &Settings,
        profile: &VmProfile,
        qmp_socket: Option<&Path>,
    ) -> Result<Self> {
        let arch = architecture_for(settings, &profile.model);

        let disk = profile
            .disk_path()
            .or_else(|| non_empty(&settings.virtual_disk_path).map(PathBuf::from))
            .filter(|disk| disk.exists())
            .ok_or_else(|| {
                EmungError::not_found(
                    "Virtual disk not found. Please create a virtual disk in settings.",
                )
            })?;

        let mut cmd = Self::new(emulator_path(settings, arch))
            .pair("-machine", format!("type={}", arch.machine()))
            .pair("-cpu", arch.default_cpu())
            .pair("-smp", profile.cpus.max(1).to_string())
            .pair("-m", memory_arg(profile.memory));

        let kernel = profile.kernel().or_else(|| {
            profile
                .use_default_kernel
                .then(|| non_empty(&settings.boot_img_path))
                .flatten()
        });
        if let Some(kernel) = kernel {
            cmd = cmd.pair("-kernel", kernel);
        }
        if let Some(recovery) = non_empty(&profile.recovery_img) {
            cmd = cmd.pair("-initrd", recovery);
        }

        cmd = cmd.pair("-drive", format!("file={},format=qcow2", disk.display()));

        let params = profile
            .kernel_params
            .as_deref()
            .and_then(non_empty)
            .or_else(|| settings.kernel_params());
        if let Some(params) = params {
            cmd = cmd.pair("-append", params);
        }

        if let Some(socket) = qmp_socket {
            cmd = cmd.pair(
                "-qmp",
                format!("unix:{},server=on,wait=off", socket.display()),
            );
        }

        Ok(cmd)
    }

    /// Headless smoke-test command for a model
    pub fn test_mode(settings: &Settings, model: &str, memory_mb: u32) -> Self {
        let arch = architecture_for(settings, model);
        Self::new(emulator_path(settings, arch))
            .pair("-machine", format!("type={}", arch.machine()))
            .pair("-cpu", arch.default_cpu())
            .pair("-m", memory_arg(memory_mb))
            .arg("-nographic")
            .pair("-monitor", "none")
            .pair("-serial", "none")
            .pair("-smp", "1")
            .pair("-boot", "order=c")
    }

    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Shell-pasteable rendering of the command
    pub fn command_line(&self) -> String {
        self.argv()
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    pub fn to_std(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

fn memory_arg(memory_mb: u32) -> String {
    if memory_mb > 0 {
        format!("{}M", memory_mb)
    } else {
        format!("{}M", DEFAULT_MEMORY_MB)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn exe_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// A QEMU tool inside `qemu_path`, or bare for a PATH lookup
pub fn tool_path(settings: &Settings, tool: &str) -> PathBuf {
    let name = exe_name(tool);
    match non_empty(&settings.qemu_path) {
        Some(dir) => Path::new(dir).join(name),
        None => PathBuf::from(name),
    }
}

/// Emulator binary for an architecture; `qemu_executable` wins when set
pub fn emulator_path(settings: &Settings, arch: Architecture) -> PathBuf {
    if let Some(executable) = non_empty(&settings.qemu_executable) {
        let path = PathBuf::from(executable);
        if path.is_absolute() || path.components().count() > 1 {
            return path;
        }
        return tool_path(settings, executable);
    }
    tool_path(settings, &format!("qemu-system-{}", arch.qemu_suffix()))
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
