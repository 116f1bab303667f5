//! Run-state records for emulator processes
//!
//! Each running VM has `run/<vm>.json` so that a later invocation can find
//! the PID to stop or the QMP socket to talk to.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub vm: String,
    pub pid: u32,
    pub argv: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qmp_socket: Option<PathBuf>,
    #[serde(default)]
    pub detached: bool,
}

/// A run-state record plus liveness at the time of the query
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    #[serde(flatten)]
    pub state: RunState,
    pub alive: bool,
}

pub struct RunRegistry {
    dir: PathBuf,
}

impl RunRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self, vm: &str) -> PathBuf {
        self.dir.join(format!("{}.json", vm))
    }

    pub fn qmp_socket_path(&self, vm: &str) -> PathBuf {
        self.dir.join(format!("{}.qmp", vm))
    }

    pub fn log_path(&self, vm: &str) -> PathBuf {
        self.dir.join(format!("{}.log", vm))
    }

    pub fn write(&self, state: &RunState) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(state)?;
        fs::write(self.state_path(&state.vm), json)?;
        Ok(())
    }

    pub fn read(&self, vm: &str) -> Result<Option<RunState>> {
        let path = self.state_path(vm);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Drop the record and the VM's QMP socket
    pub fn remove(&self, vm: &str) -> Result<()> {
        for path in [self.state_path(vm), self.qmp_socket_path(vm)] {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Live record for a VM; stale records are removed on the way
    pub fn live(&self, vm: &str) -> Result<Option<RunState>> {
        match self.read(vm)? {
            Some(state) if is_running(&state) => Ok(Some(state)),
            Some(_) => {
                debug!("Pruning stale run state for '{}'", vm);
                self.remove(vm)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Every record, with liveness
    pub fn list(&self) -> Result<Vec<RunStatus>> {
        let mut statuses = Vec::new();
        if !self.dir.exists() {
            return Ok(statuses);
        }

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !is_json(&path) {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str::<RunState>(&contents) {
                Ok(state) => {
                    let alive = is_running(&state);
                    statuses.push(RunStatus { state, alive });
                }
                Err(e) => debug!("Ignoring unreadable run state {}: {}", path.display(), e),
            }
        }
        statuses.sort_by(|a, b| a.state.vm.cmp(&b.state.vm));
        Ok(statuses)
    }

    /// Every record with liveness; records of dead processes are removed
    /// after being reported once
    pub fn sweep(&self) -> Result<Vec<RunStatus>> {
        let statuses = self.list()?;
        for status in statuses.iter().filter(|s| !s.alive) {
            debug!("Pruning stale run state for '{}'", status.state.vm);
            self.remove(&status.state.vm)?;
        }
        Ok(statuses)
    }
}

/// Whether the process a record points at is still that emulator
///
/// A live PID alone is not enough: after a crash the PID can be reused by
/// an unrelated process. Where `/proc` is available the process must not
/// be a zombie and its command line must name the recorded program.
pub fn is_running(state: &RunState) -> bool {
    if !is_alive(state.pid) {
        return false;
    }
    let program = match state.argv.first().and_then(|p| Path::new(p).file_name()) {
        Some(program) => program,
        None => return true,
    };
    proc_matches(state.pid, program).unwrap_or(true)
}

/// `None` when the process cannot be inspected through `/proc`
fn proc_matches(pid: u32, program: &std::ffi::OsStr) -> Option<bool> {
    let proc_dir = Path::new("/proc").join(pid.to_string());
    let stat = fs::read_to_string(proc_dir.join("stat")).ok()?;
    // The state follows the parenthesised command name, which may hold spaces
    let state = stat.rsplit_once(')')?.1.split_whitespace().next()?;
    if state == "Z" || state == "X" {
        return Some(false);
    }

    let cmdline = fs::read(proc_dir.join("cmdline")).ok()?;
    let matches = cmdline
        .split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .any(|arg| {
            let arg = String::from_utf8_lossy(arg);
            Path::new(&*arg).file_name() == Some(program)
        });
    Some(matches)
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

#[cfg(unix)]
mod signals {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    /// Only positive PIDs name a single process; 0 and negative values
    /// address process groups
    fn pid(p: u32) -> Option<Pid> {
        i32::try_from(p).ok().filter(|p| *p > 0).map(Pid::from_raw)
    }

    pub fn is_alive(p: u32) -> bool {
        let Some(pid) = pid(p) else {
            return false;
        };
        match kill(pid, None) {
            Ok(()) => true,
            // Exists but owned by someone else
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    pub fn terminate(p: u32) -> std::io::Result<()> {
        send(p, Signal::SIGTERM)
    }

    pub fn force_kill(p: u32) -> std::io::Result<()> {
        send(p, Signal::SIGKILL)
    }

    fn send(p: u32, signal: Signal) -> std::io::Result<()> {
        let pid = pid(p).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("refusing to signal invalid pid {}", p),
            )
        })?;
        match kill(pid, signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(std::io::Error::from(e)),
        }
    }
}

#[cfg(not(unix))]
mod signals {
    use std::process::{Command, Stdio};

    pub fn is_alive(p: u32) -> bool {
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", p), "/NH"])
            .output()
            .map(|out| String::from_utf8_lossy(&out.stdout).contains(&p.to_string()))
            .unwrap_or(false)
    }

    pub fn terminate(p: u32) -> std::io::Result<()> {
        taskkill(p, false)
    }

    pub fn force_kill(p: u32) -> std::io::Result<()> {
        taskkill(p, true)
    }

    fn taskkill(p: u32, force: bool) -> std::io::Result<()> {
        let mut cmd = Command::new("taskkill");
        cmd.args(["/PID", &p.to_string()]);
        if force {
            cmd.arg("/F");
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::null()).status()?;
        Ok(())
    }
}

pub use signals::{force_kill, is_alive, terminate};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state(vm: &str, pid: u32, program: &str) -> RunState {
        RunState {
            vm: vm.to_string(),
            pid,
            argv: vec![program.to_string(), "-m".into(), "1024M".into()],
            started_at: Utc::now(),
            qmp_socket: None,
            detached: true,
        }
    }

    /// A record describing this very test process
    fn own_state(vm: &str) -> RunState {
        let program = std::env::args().next().unwrap();
        state(vm, std::process::id(), &program)
    }

    #[test]
    fn test_write_read_remove() {
        let tmp = TempDir::new().unwrap();
        let registry = RunRegistry::new(tmp.path().join("run"));

        registry.write(&own_state("s10")).unwrap();
        let read = registry.read("s10").unwrap().unwrap();
        assert_eq!(read.pid, std::process::id());

        registry.remove("s10").unwrap();
        assert!(registry.read("s10").unwrap().is_none());
        // Removing twice is fine
        registry.remove("s10").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_current_process_is_running() {
        assert!(is_alive(std::process::id()));
        assert!(is_running(&own_state("self")));
    }

    #[cfg(unix)]
    #[test]
    fn test_group_pids_are_rejected() {
        for pid in [0, u32::MAX, i32::MAX as u32 + 1] {
            assert!(!is_alive(pid));
            assert!(!is_running(&state("bogus", pid, "qemu-system-aarch64")));
            let err = terminate(pid).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
            assert!(force_kill(pid).is_err());
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reused_pid_is_not_the_emulator() {
        // Our PID is alive but this process is not a QEMU binary
        assert!(!is_running(&state("s10", std::process::id(), "/usr/bin/qemu-system-aarch64")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_zombie_is_not_running() {
        let child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        // Not reaped yet: the PID stays allocated as a zombie
        std::thread::sleep(std::time::Duration::from_millis(300));
        assert!(is_alive(pid));
        assert!(!is_running(&state("z", pid, "true")));
        drop(child);
    }

    #[cfg(unix)]
    #[test]
    fn test_sweep_prunes_stale_records() {
        let tmp = TempDir::new().unwrap();
        let registry = RunRegistry::new(tmp.path());

        // Spawn and reap a child so its PID is known to be gone
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();

        registry.write(&own_state("live")).unwrap();
        registry.write(&state("dead", dead_pid, "qemu-system-arm")).unwrap();

        let statuses = registry.sweep().unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().any(|s| s.state.vm == "live" && s.alive));
        assert!(statuses.iter().any(|s| s.state.vm == "dead" && !s.alive));

        assert!(registry.read("dead").unwrap().is_none());
        assert!(registry.live("live").unwrap().is_some());
        assert_eq!(registry.sweep().unwrap().len(), 1);
    }
}
