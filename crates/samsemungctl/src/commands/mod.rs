//! Command implementations for samsemungctl

mod analyze;
mod config;
mod disk;
mod docs;
mod kernel;
mod models;
mod recovery;
mod run;
mod vm;

pub use analyze::analyze;
pub use config::{config_path, config_set, config_set_model, config_show};
pub use disk::disk_create;
pub use docs::docs;
pub use kernel::{kernel_add, kernel_find, kernel_list, kernel_validate};
pub use models::models;
pub use recovery::{recovery_add, recovery_list};
pub use run::{dump, start, status, stop, test};
pub use vm::{vm_cmdline, vm_delete, vm_import, vm_list, vm_new, vm_show, NewVm};

use anyhow::{Context, Result};
use samsemung_common::{DataDirs, EmulatorController, ImageLibrary, Settings, VmStore};
use std::path::{Path, PathBuf};

/// Settings plus data directories for one invocation
pub struct AppContext {
    pub config_path: PathBuf,
    pub settings: Settings,
    pub dirs: DataDirs,
}

impl AppContext {
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let config_path = Settings::resolve_path(config);
        let settings = Settings::load(&config_path)?;
        let dirs = DataDirs::from_env();
        dirs.ensure()
            .with_context(|| format!("Failed to create data directory {}", dirs.root.display()))?;

        Ok(Self {
            config_path,
            settings,
            dirs,
        })
    }

    pub fn save_settings(&self) -> Result<()> {
        self.settings.save(&self.config_path)
    }

    pub fn controller(&self) -> EmulatorController {
        EmulatorController::new(self.settings.clone(), &self.dirs)
    }

    pub fn vms(&self) -> Result<VmStore> {
        VmStore::open(&self.dirs.vms)
    }

    pub fn library(&self) -> ImageLibrary {
        ImageLibrary::new(&self.dirs)
    }
}

fn or_none(value: &str) -> &str {
    if value.trim().is_empty() {
        "(none)"
    } else {
        value
    }
}
