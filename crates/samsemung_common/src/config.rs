//! SamsEmung settings
//!
//! Flat JSON document. Keys missing from the file fall back to their
//! defaults; keys this version does not know about are carried through a
//! load/save cycle untouched.
//!
//! Location, first match wins:
//! 1. explicit path (`--config`)
//! 2. $SAMSEMUNG_CONFIG
//! 3. <config dir>/samsemung/config.json
//! 4. ./samsemung_config.json

use crate::device::Architecture;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment override for the settings file
pub const CONFIG_ENV: &str = "SAMSEMUNG_CONFIG";

const CONFIG_DIR: &str = "samsemung";
const CONFIG_FILE: &str = "config.json";
const FALLBACK_CONFIG_FILE: &str = "samsemung_config.json";

/// Keys accepted by [`Settings::set`]
pub const SETTABLE_KEYS: &[&str] = &[
    "qemu_path",
    "qemu_executable",
    "dump_folder",
    "boot_img_path",
    "virtual_disk_size",
    "virtual_disk_path",
    "kernel_params",
    "log_level",
    "touchwiz_versions",
    "oneui_versions",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// QEMU install directory; empty means resolve binaries from PATH
    pub qemu_path: String,

    /// Explicit emulator binary, overrides the per-architecture binary
    pub qemu_executable: String,

    /// Model name to guest architecture
    pub samsung_models: BTreeMap<String, Architecture>,

    pub dump_folder: String,
    pub boot_img_path: String,

    /// Size in MiB for `disk create`
    pub virtual_disk_size: u64,
    pub virtual_disk_path: String,

    pub touchwiz_versions: Vec<String>,
    pub oneui_versions: Vec<String>,

    /// Extra kernel command line passed through `-append`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_params: Option<String>,

    pub log_level: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let samsung_models = [
            ("Galaxy S10", Architecture::Arm64),
            ("Galaxy S20", Architecture::Arm64),
            ("Galaxy Note 10", Architecture::Arm64),
            ("SM-G900F", Architecture::Arm),
        ]
        .into_iter()
        .map(|(name, arch)| (name.to_string(), arch))
        .collect();

        Self {
            qemu_path: String::new(),
            qemu_executable: String::new(),
            samsung_models,
            dump_folder: String::new(),
            boot_img_path: String::new(),
            virtual_disk_size: 4096,
            virtual_disk_path: String::new(),
            touchwiz_versions: vec![
                "TouchWiz 5".to_string(),
                "TouchWiz 6".to_string(),
                "TouchWiz 7".to_string(),
            ],
            oneui_versions: vec![
                "One UI 1.0".to_string(),
                "One UI 2.0".to_string(),
                "One UI 3.0".to_string(),
            ],
            kernel_params: None,
            log_level: "warn".to_string(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Resolve the settings file path
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        match dirs::config_dir() {
            Some(dir) => dir.join(CONFIG_DIR).join(CONFIG_FILE),
            None => PathBuf::from(FALLBACK_CONFIG_FILE),
        }
    }

    /// Load settings, merged over defaults. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings)
    }

    /// Write settings as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// TouchWiz labels followed by One UI labels
    pub fn ui_versions(&self) -> Vec<String> {
        self.touchwiz_versions
            .iter()
            .chain(self.oneui_versions.iter())
            .cloned()
            .collect()
    }

    /// Kernel parameters, treating an empty string as unset
    pub fn kernel_params(&self) -> Option<&str> {
        self.kernel_params
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Typed update of a single key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "qemu_path" => self.qemu_path = value.to_string(),
            "qemu_executable" => self.qemu_executable = value.to_string(),
            "dump_folder" => self.dump_folder = value.to_string(),
            "boot_img_path" => self.boot_img_path = value.to_string(),
            "virtual_disk_path" => self.virtual_disk_path = value.to_string(),
            "virtual_disk_size" => {
                let size: u64 = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid size '{}'. Use a number of MiB", value))?;
                if size == 0 {
                    anyhow::bail!("virtual_disk_size must be greater than zero");
                }
                self.virtual_disk_size = size;
            }
            "kernel_params" => {
                self.kernel_params = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "log_level" => {
                let level = value.to_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    anyhow::bail!(
                        "Invalid log level '{}'. Valid values: {}",
                        value,
                        LOG_LEVELS.join(", ")
                    );
                }
                self.log_level = level;
            }
            "touchwiz_versions" => self.touchwiz_versions = split_list(value),
            "oneui_versions" => self.oneui_versions = split_list(value),
            _ => anyhow::bail!(
                "Unknown configuration key: {}. Available keys: {}",
                key,
                SETTABLE_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Add or replace a model in the architecture table
    pub fn set_model(&mut self, model: &str, arch: Architecture) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            anyhow::bail!("Model name cannot be empty");
        }
        self.samsung_models.insert(model.to_string(), arch);
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
