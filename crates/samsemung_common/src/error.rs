//! Error type shared across the library

use std::path::PathBuf;

/// Result alias for library operations
pub type Result<T> = std::result::Result<T, EmungError>;

/// Emulator control errors
#[derive(Debug, thiserror::Error)]
pub enum EmungError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    NotFound(String),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Invalid VM profile: {0}")]
    InvalidProfile(String),

    #[error("{tool} failed: {stderr}")]
    QemuFailed { tool: String, stderr: String },

    #[error("Emulator is not running for '{0}'")]
    NotRunning(String),

    #[error("Emulator for '{vm}' is already running (pid {pid})")]
    AlreadyRunning { vm: String, pid: u32 },

    #[error("QMP error: {0}")]
    Qmp(String),

    #[error("No kernel file found in the zip archive: {}", .0.display())]
    KernelNotInArchive(PathBuf),
}

impl EmungError {
    pub fn not_found(message: impl Into<String>) -> Self {
        EmungError::NotFound(message.into())
    }

    /// True for errors caused by a missing file or resource
    pub fn is_not_found(&self) -> bool {
        match self {
            EmungError::NotFound(_) | EmungError::KernelNotInArchive(_) => true,
            EmungError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
