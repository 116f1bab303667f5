//! VM profiles
//!
//! One JSON file per VM under `vms/`, next to the VM's qcow2 disk.

use crate::qemu::EmulatorController;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MEMORY_RANGE: (u32, u32) = (1024, 16384);
pub const DISK_SIZE_RANGE: (u64, u64) = (4096, 102_400);
pub const CPU_RANGE: (u32, u32) = (1, 8);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmProfile {
    pub name: String,
    pub model: String,
    pub ui_version: String,

    /// Guest RAM in MiB
    pub memory: u32,
    pub cpus: u32,

    pub use_default_kernel: bool,
    pub kernel_path: String,
    pub recovery_img: String,

    /// Disk size in MiB
    pub disk_size: u64,
    pub virtual_disk_path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_folder: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_params: Option<String>,

    pub created_at: Option<DateTime<Utc>>,
}

impl Default for VmProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: "Galaxy S10".to_string(),
            ui_version: "One UI 3.0".to_string(),
            memory: 2048,
            cpus: 2,
            use_default_kernel: true,
            kernel_path: String::new(),
            recovery_img: String::new(),
            disk_size: 8192,
            virtual_disk_path: String::new(),
            dump_folder: None,
            kernel_params: None,
            created_at: None,
        }
    }
}

impl VmProfile {
    /// Check name and resource ranges
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::EmungError::InvalidProfile;

        validate_name(&self.name)?;

        if !(MEMORY_RANGE.0..=MEMORY_RANGE.1).contains(&self.memory) {
            return Err(InvalidProfile(format!(
                "memory must be {}-{} MB, got {}",
                MEMORY_RANGE.0, MEMORY_RANGE.1, self.memory
            )));
        }
        if !(DISK_SIZE_RANGE.0..=DISK_SIZE_RANGE.1).contains(&self.disk_size) {
            return Err(InvalidProfile(format!(
                "disk size must be {}-{} MB, got {}",
                DISK_SIZE_RANGE.0, DISK_SIZE_RANGE.1, self.disk_size
            )));
        }
        if !(CPU_RANGE.0..=CPU_RANGE.1).contains(&self.cpus) {
            return Err(InvalidProfile(format!(
                "processors must be {}-{}, got {}",
                CPU_RANGE.0, CPU_RANGE.1, self.cpus
            )));
        }
        Ok(())
    }

    /// Explicit kernel image, if one is configured
    pub fn kernel(&self) -> Option<&str> {
        let kernel = self.kernel_path.trim();
        if kernel.is_empty() {
            None
        } else {
            Some(kernel)
        }
    }

    pub fn disk_path(&self) -> Option<PathBuf> {
        let disk = self.virtual_disk_path.trim();
        if disk.is_empty() {
            None
        } else {
            Some(PathBuf::from(disk))
        }
    }
}

/// VM names become file names, so they may not contain path syntax
pub fn validate_name(name: &str) -> crate::error::Result<()> {
    let bad = name.trim().is_empty()
        || name.trim() != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', ':', '\0']);
    if bad {
        return Err(crate::error::EmungError::InvalidProfile(format!(
            "invalid VM name '{}'",
            name
        )));
    }
    Ok(())
}

/// Profile storage under the `vms/` directory
pub struct VmStore {
    dir: PathBuf,
}

impl VmStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create VM directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    pub fn disk_path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.qcow2", name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.profile_path(name).exists()
    }

    /// Create the VM's disk, then persist the profile
    ///
    /// The disk is removed again if the profile cannot be written.
    pub fn create(&self, mut profile: VmProfile, controller: &EmulatorController) -> Result<VmProfile> {
        profile.validate()?;
        if self.exists(&profile.name) {
            anyhow::bail!("A virtual machine named '{}' already exists", profile.name);
        }

        info!("Creating virtual disk of size {}MB", profile.disk_size);
        let disk = self.disk_path_for(&profile.name);
        controller.create_virtual_disk(&disk, profile.disk_size)?;

        profile.virtual_disk_path = disk.display().to_string();
        profile.created_at = Some(Utc::now());

        if let Err(e) = self.save(&profile) {
            if disk.exists() {
                if let Err(rm) = fs::remove_file(&disk) {
                    warn!("Could not remove virtual disk {}: {}", disk.display(), rm);
                }
            }
            return Err(e.context(format!("Failed to add VM '{}'", profile.name)));
        }

        info!("Virtual machine '{}' created", profile.name);
        Ok(profile)
    }

    pub fn save(&self, profile: &VmProfile) -> Result<()> {
        validate_name(&profile.name)?;
        let path = self.profile_path(&profile.name);
        let json = serde_json::to_string_pretty(profile)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<VmProfile> {
        validate_name(name)?;
        let path = self.profile_path(name);
        if !path.exists() {
            return Err(crate::error::EmungError::not_found(format!(
                "Virtual machine '{}' not found",
                name
            ))
            .into());
        }
        read_profile(&path)
    }

    /// Profile names in sorted order
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Copy an external profile into the store
    pub fn import(&self, source: &Path) -> Result<VmProfile> {
        let profile = read_profile(source)?;
        validate_name(&profile.name)?;
        if self.exists(&profile.name) {
            anyhow::bail!("A virtual machine named '{}' already exists", profile.name);
        }
        if let Some(disk) = profile.disk_path() {
            if !disk.exists() {
                warn!("Imported VM '{}' points at a missing disk: {}", profile.name, disk.display());
            }
        }
        self.save(&profile)?;
        info!("Virtual machine '{}' imported from {}", profile.name, source.display());
        Ok(profile)
    }

    /// Remove the disk and the profile
    ///
    /// A disk that cannot be removed is reported but does not stop the
    /// profile from being deleted.
    pub fn delete(&self, name: &str) -> Result<Vec<String>> {
        let profile = self.load(name)?;
        let mut warnings = Vec::new();

        if let Some(disk) = profile.disk_path() {
            if disk.exists() {
                if let Err(e) = fs::remove_file(&disk) {
                    let msg = format!("Could not delete virtual disk: {}", e);
                    warn!("{}", msg);
                    warnings.push(msg);
                }
            }
        }

        let path = self.profile_path(name);
        fs::remove_file(&path).with_context(|| format!("Could not delete config file {}", path.display()))?;
        info!("Virtual machine '{}' deleted", name);
        Ok(warnings)
    }
}

fn read_profile(path: &Path) -> Result<VmProfile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let profile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(profile)
}
