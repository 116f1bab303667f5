//! Firmware dump analysis
//!
//! Reads device facts out of an extracted firmware tree:
//! - `system/build.prop` for model, manufacturer and One UI version
//! - `boot/kernel` for kernel presence and its version banner

use crate::device::DeviceModel;
use crate::error::Result;
use crate::kernel::find_version_banner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const UNKNOWN: &str = "Unknown";

const PROP_MODEL: &str = "ro.product.model";
const PROP_MANUFACTURER: &str = "ro.product.manufacturer";
const PROP_ONEUI: &str = "ro.build.version.oneui";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KernelPresence {
    Found { version: Option<String> },
    NotFound,
}

impl fmt::Display for KernelPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelPresence::Found { version: Some(v) } => write!(f, "Found ({})", v),
            KernelPresence::Found { version: None } => f.write_str("Found (no version banner)"),
            KernelPresence::NotFound => f.write_str("Not found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpAnalysis {
    pub device_model: Option<DeviceModel>,
    pub ui_version: String,
    pub kernel: KernelPresence,
}

pub struct DumpAnalyzer {
    dump_folder: PathBuf,
}

impl DumpAnalyzer {
    pub fn new(dump_folder: impl Into<PathBuf>) -> Self {
        Self {
            dump_folder: dump_folder.into(),
        }
    }

    pub fn analyze(&self) -> Result<DumpAnalysis> {
        let result = self.run();
        match &result {
            Ok(analysis) => info!(
                "Dump analysis completed: {}",
                serde_json::to_string_pretty(analysis).unwrap_or_default()
            ),
            Err(e) => error!("Error during dump analysis: {}", e),
        }
        result
    }

    fn run(&self) -> Result<DumpAnalysis> {
        let build_prop = self.read_build_prop()?;

        let device_model = build_prop.as_deref().map(|content| {
            DeviceModel::new(
                extract_property(content, PROP_MODEL),
                extract_property(content, PROP_MANUFACTURER),
            )
        });

        let ui_version = build_prop
            .as_deref()
            .and_then(|content| extract_property(content, PROP_ONEUI))
            .and_then(|raw| oneui_label(&raw))
            .unwrap_or_else(|| UNKNOWN.to_string());

        Ok(DumpAnalysis {
            device_model,
            ui_version,
            kernel: self.detect_kernel()?,
        })
    }

    fn read_build_prop(&self) -> Result<Option<String>> {
        let path = self.dump_folder.join("system").join("build.prop");
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn detect_kernel(&self) -> Result<KernelPresence> {
        let path = self.dump_folder.join("boot").join("kernel");
        if !path.is_file() {
            return Ok(KernelPresence::NotFound);
        }
        let data = fs::read(&path)?;
        Ok(KernelPresence::Found {
            version: find_version_banner(&data),
        })
    }
}

/// Value of the first `name=value` line whose key is exactly `name`
pub fn extract_property(content: &str, name: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim_start)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}

/// `40100` -> `One UI 4.1`
fn oneui_label(raw: &str) -> Option<String> {
    let code: u32 = raw.trim().parse().ok()?;
    let major = code / 10_000;
    let minor = (code / 100) % 100;
    if major == 0 {
        return None;
    }
    Some(format!("One UI {}.{}", major, minor))
}

/// Model name (or "Unknown") and UI version for a dump folder
pub fn analyze_dump(dump_folder: &Path) -> Result<(String, String)> {
    let analysis = DumpAnalyzer::new(dump_folder).analyze()?;
    let model = analysis
        .device_model
        .and_then(|device| device.model)
        .unwrap_or_else(|| UNKNOWN.to_string());
    Ok((model, analysis.ui_version))
}
