//! Device models and guest architectures

use crate::config::Settings;
use crate::error::EmungError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Guest CPU architecture of an emulated handset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Architecture {
    #[serde(rename = "arm")]
    Arm,
    #[default]
    #[serde(rename = "arm64")]
    Arm64,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
            Architecture::X86_64 => "x86_64",
        }
    }

    /// Suffix of the matching `qemu-system-*` binary
    pub fn qemu_suffix(&self) -> &'static str {
        match self {
            Architecture::Arm => "arm",
            Architecture::Arm64 => "aarch64",
            Architecture::X86_64 => "x86_64",
        }
    }

    pub fn machine(&self) -> &'static str {
        match self {
            Architecture::Arm | Architecture::Arm64 => "virt",
            Architecture::X86_64 => "q35",
        }
    }

    pub fn default_cpu(&self) -> &'static str {
        match self {
            Architecture::Arm => "cortex-a15",
            Architecture::Arm64 => "cortex-a57",
            Architecture::X86_64 => "max",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = EmungError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arm" | "armv7" => Ok(Architecture::Arm),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            "x86_64" | "amd64" => Ok(Architecture::X86_64),
            other => Err(EmungError::UnsupportedArchitecture(other.to_string())),
        }
    }
}

/// Handset identity scraped from `build.prop`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceModel {
    pub model: Option<String>,
    pub manufacturer: Option<String>,
}

impl DeviceModel {
    pub fn new(model: Option<String>, manufacturer: Option<String>) -> Self {
        Self {
            model,
            manufacturer,
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let manufacturer = self.manufacturer.as_deref().unwrap_or("Unknown");
        let model = self.model.as_deref().unwrap_or("Unknown");
        write!(f, "{} {}", manufacturer, model)
    }
}

/// Architecture for a model name; models missing from the table run as arm64
pub fn architecture_for(settings: &Settings, model: &str) -> Architecture {
    settings
        .samsung_models
        .get(model)
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_parse() {
        assert_eq!("arm".parse::<Architecture>().unwrap(), Architecture::Arm);
        assert_eq!("AArch64".parse::<Architecture>().unwrap(), Architecture::Arm64);
        assert_eq!("x86_64".parse::<Architecture>().unwrap(), Architecture::X86_64);
        assert!(matches!(
            "mips".parse::<Architecture>(),
            Err(EmungError::UnsupportedArchitecture(_))
        ));
    }

    #[test]
    fn test_architecture_serde_names() {
        let json = serde_json::to_string(&Architecture::Arm64).unwrap();
        assert_eq!(json, "\"arm64\"");
        let arch: Architecture = serde_json::from_str("\"x86_64\"").unwrap();
        assert_eq!(arch, Architecture::X86_64);
    }

    #[test]
    fn test_unknown_model_defaults_to_arm64() {
        let settings = Settings::default();
        assert_eq!(architecture_for(&settings, "SM-G900F"), Architecture::Arm);
        assert_eq!(architecture_for(&settings, "Galaxy S10"), Architecture::Arm64);
        assert_eq!(architecture_for(&settings, "Galaxy Fold"), Architecture::Arm64);
    }

    #[test]
    fn test_device_model_display() {
        let device = DeviceModel::new(Some("Galaxy S10".into()), Some("Samsung".into()));
        assert_eq!(device.to_string(), "Samsung Galaxy S10");
        assert_eq!(DeviceModel::default().to_string(), "Unknown Unknown");
    }
}
