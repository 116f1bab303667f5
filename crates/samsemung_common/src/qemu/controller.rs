//! Emulator process control
//!
//! Owns the lifecycle of QEMU child processes:
//! - disk creation through `qemu-img`
//! - foreground or detached launches with a run-state record
//! - graceful stop: SIGTERM, 5 second grace, then SIGKILL
//! - headless smoke tests
//! - guest memory dumps over QMP

use super::command::QemuCommand;
use super::process::{self, RunRegistry, RunState, RunStatus};
use crate::config::Settings;
use crate::error::{EmungError, Result};
use crate::paths::DataDirs;
use crate::vm::VmProfile;
use chrono::Utc;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Grace period between SIGTERM and SIGKILL
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a smoke-test emulator must survive to pass
pub const TEST_WINDOW: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Wait for the emulator; Ctrl-C stops it
    Foreground,
    /// Return once the emulator is spawned
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Exited { code: Option<i32> },
    Interrupted,
    Detached { pid: u32 },
}

pub struct EmulatorController {
    settings: Settings,
    registry: RunRegistry,
}

impl EmulatorController {
    pub fn new(settings: Settings, dirs: &DataDirs) -> Self {
        Self {
            settings,
            registry: RunRegistry::new(&dirs.run),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Create a qcow2 image, replacing any file already at `path`
    pub fn create_virtual_disk(&self, path: &Path, size_mb: u64) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            fs::remove_file(path)?;
        }

        let cmd = QemuCommand::create_disk(&self.settings, path, size_mb);
        debug!("Running {}", cmd.command_line());

        let output = cmd.to_std().output().map_err(|e| spawn_error(&cmd, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("Failed to create virtual disk: {}", stderr);
            return Err(EmungError::QemuFailed {
                tool: "qemu-img".to_string(),
                stderr,
            });
        }

        if !path.exists() {
            return Err(EmungError::not_found("Virtual disk file was not created"));
        }

        info!("Virtual disk created at: {}", path.display());
        debug!("qemu-img output: {}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(path.to_path_buf())
    }

    /// The exact command `start` would run for a profile
    pub fn launch_command(&self, profile: &VmProfile) -> Result<QemuCommand> {
        let socket = if cfg!(unix) {
            Some(self.registry.qmp_socket_path(&profile.name))
        } else {
            None
        };
        QemuCommand::launch(&self.settings, profile, socket.as_deref())
    }

    pub fn command_line(&self, profile: &VmProfile) -> Result<String> {
        Ok(self.launch_command(profile)?.command_line())
    }

    pub async fn start(&self, profile: &VmProfile, mode: StartMode) -> Result<StartOutcome> {
        if let Some(state) = self.registry.live(&profile.name)? {
            return Err(EmungError::AlreadyRunning {
                vm: profile.name.clone(),
                pid: state.pid,
            });
        }

        let cmd = self.launch_command(profile)?;
        let qmp_socket = self.registry.qmp_socket_path(&profile.name);
        // A socket left over from a crashed run would make QEMU fail to bind
        if qmp_socket.exists() {
            fs::remove_file(&qmp_socket)?;
        }

        let mut child_cmd = cmd.to_std();
        child_cmd.env("GTK_PATH", "").stdin(Stdio::null());

        if mode == StartMode::Detached {
            fs::create_dir_all(self.registry.dir())?;
            let log = File::create(self.registry.log_path(&profile.name))?;
            child_cmd.stdout(log.try_clone()?).stderr(log);
            // Own process group, so a Ctrl-C in this terminal does not reach it
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                child_cmd.process_group(0);
            }
        }

        let mut child = tokio::process::Command::from(child_cmd)
            .spawn()
            .map_err(|e| spawn_error(&cmd, e))?;
        let pid = child
            .id()
            .ok_or_else(|| EmungError::NotRunning(profile.name.clone()))?;

        self.registry.write(&RunState {
            vm: profile.name.clone(),
            pid,
            argv: cmd.argv(),
            started_at: Utc::now(),
            qmp_socket: cfg!(unix).then_some(qmp_socket),
            detached: mode == StartMode::Detached,
        })?;
        info!("Started QEMU emulator for {} (pid {})", profile.model, pid);

        if mode == StartMode::Detached {
            // Reap it if it exits while this process is still around
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => debug!("Detached emulator pid {} exited with {}", pid, status),
                    Err(e) => debug!("Could not wait for emulator pid {}: {}", pid, e),
                }
            });
            return Ok(StartOutcome::Detached { pid });
        }

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::signal::ctrl_c() => None,
        };

        match exited {
            Some(waited) => self.foreground_exit(&profile.name, waited),
            None => {
                info!("Interrupted, stopping emulator for '{}'", profile.name);
                let stopped = stop_child(&mut child).await;
                self.registry.remove(&profile.name)?;
                stopped?;
                Ok(StartOutcome::Interrupted)
            }
        }
    }

    /// The run record is dropped whether or not the wait itself succeeded
    fn foreground_exit(
        &self,
        vm: &str,
        waited: std::io::Result<ExitStatus>,
    ) -> Result<StartOutcome> {
        self.registry.remove(vm)?;
        let status = waited?;
        info!("Emulator for '{}' exited with {}", vm, status);
        Ok(StartOutcome::Exited { code: status.code() })
    }

    /// Stop a VM's emulator; `false` when nothing was running
    pub async fn stop(&self, vm: &str) -> Result<bool> {
        let state = match self.registry.live(vm)? {
            Some(state) => state,
            None => {
                warn!("No running emulator to stop");
                return Ok(false);
            }
        };

        process::terminate(state.pid)?;
        let deadline = Instant::now() + STOP_TIMEOUT;
        while process::is_running(&state) && Instant::now() < deadline {
            sleep(POLL_INTERVAL).await;
        }
        if process::is_running(&state) {
            warn!("Emulator pid {} ignored SIGTERM, killing", state.pid);
            process::force_kill(state.pid)?;
            let deadline = Instant::now() + STOP_TIMEOUT;
            while process::is_running(&state) && Instant::now() < deadline {
                sleep(POLL_INTERVAL).await;
            }
        }

        self.registry.remove(vm)?;
        info!("Stopped QEMU emulator");
        Ok(true)
    }

    /// Run-state records; dead ones are reported once and pruned
    pub fn status(&self) -> Result<Vec<RunStatus>> {
        self.registry.sweep()
    }

    /// Boot a headless emulator and make sure it survives the test window
    pub async fn test_emulator(&self, model: &str, memory_mb: u32) -> Result<QemuCommand> {
        let cmd = QemuCommand::test_mode(&self.settings, model, memory_mb);
        let mut child = cmd
            .to_tokio()
            .env("GTK_PATH", "")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&cmd, e))?;
        info!("Started QEMU emulator in test mode for {}", model);

        match timeout(TEST_WINDOW, child.wait()).await {
            Ok(status) => {
                let status = status?;
                if !status.success() {
                    let stderr = read_stderr(&mut child).await;
                    error!("Emulator test failed: {}", stderr);
                    return Err(EmungError::QemuFailed {
                        tool: format!("Emulator test ({})", status),
                        stderr,
                    });
                }
                info!("Test emulator exited cleanly");
            }
            Err(_) => {
                info!("Test emulator still running after {:?}, stopping it", TEST_WINDOW);
                stop_child(&mut child).await?;
            }
        }

        Ok(cmd)
    }

    /// Dump guest memory of a running VM to `output`
    pub async fn create_dump(&self, vm: &str, output: &Path) -> Result<PathBuf> {
        let state = self
            .registry
            .live(vm)?
            .ok_or_else(|| EmungError::NotRunning(vm.to_string()))?;

        let output = if output.is_absolute() {
            output.to_path_buf()
        } else {
            std::env::current_dir()?.join(output)
        };

        let socket = state.qmp_socket.ok_or_else(|| {
            EmungError::Qmp(format!("'{}' was started without a monitor socket", vm))
        })?;
        dump_over_qmp(&socket, &output).await?;

        info!("Dump file created at: {}", output.display());
        Ok(output)
    }
}

#[cfg(unix)]
async fn dump_over_qmp(socket: &Path, output: &Path) -> Result<()> {
    let mut client = super::qmp::QmpClient::connect(socket).await?;
    client.dump_guest_memory(output).await
}

#[cfg(not(unix))]
async fn dump_over_qmp(_socket: &Path, _output: &Path) -> Result<()> {
    Err(EmungError::Qmp(
        "memory dumps need a Unix monitor socket".to_string(),
    ))
}

async fn read_stderr(child: &mut Child) -> String {
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        if let Err(e) = pipe.read_to_string(&mut stderr).await {
            debug!("Could not read emulator stderr: {}", e);
        }
    }
    stderr.trim().to_string()
}

/// SIGTERM an owned child, escalate to SIGKILL after the grace period
async fn stop_child(child: &mut Child) -> Result<()> {
    if let Some(pid) = child.id() {
        process::terminate(pid)?;
        if timeout(STOP_TIMEOUT, child.wait()).await.is_ok() {
            return Ok(());
        }
        warn!("Emulator pid {} ignored SIGTERM, killing", pid);
    }
    child.kill().await?;
    Ok(())
}

fn spawn_error(cmd: &QemuCommand, e: std::io::Error) -> EmungError {
    if e.kind() == std::io::ErrorKind::NotFound {
        EmungError::not_found(format!(
            "QEMU binary not found: {} (set qemu_path or qemu_executable)",
            cmd.program.display()
        ))
    } else {
        EmungError::Io(e)
    }
}
