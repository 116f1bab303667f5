//! On-disk layout for kernels, recovery images, VM profiles and run state

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment override for the data root
pub const HOME_ENV: &str = "SAMSEMUNG_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirs {
    pub root: PathBuf,
    pub kernels: PathBuf,
    pub recovery: PathBuf,
    pub vms: PathBuf,
    pub run: PathBuf,
}

impl DataDirs {
    pub fn at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            kernels: root.join("kernels"),
            recovery: root.join("recovery"),
            vms: root.join("vms"),
            run: root.join("run"),
            root,
        }
    }

    /// $SAMSEMUNG_HOME, else the per-user data directory
    pub fn default_root() -> PathBuf {
        if let Ok(home) = std::env::var(HOME_ENV) {
            if !home.is_empty() {
                return PathBuf::from(home);
            }
        }

        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("samsemung")
    }

    pub fn from_env() -> Self {
        Self::at(Self::default_root())
    }

    /// Create every directory of the layout
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [&self.root, &self.kernels, &self.recovery, &self.vms, &self.run] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
