//! Kernel image inspection
//!
//! Header sniffing only. Nothing here decompresses or parses a kernel beyond
//! the handful of magic values boot loaders themselves look at.

use crate::error::{EmungError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Typical kernel image size bounds
pub const MIN_KERNEL_SIZE: u64 = 2 * 1024 * 1024;
pub const MAX_KERNEL_SIZE: u64 = 100 * 1024 * 1024;

const ANDROID_BOOT_MAGIC: &[u8] = b"ANDROID!";
const BZIMAGE_MAGIC: &[u8] = b"HdrS";
const BZIMAGE_MAGIC_OFFSET: usize = 0x202;
const ARM64_IMAGE_MAGIC: &[u8] = b"ARM\x64";
const ARM64_IMAGE_MAGIC_OFFSET: usize = 0x38;
const ZIMAGE_MAGIC: u32 = 0x016F_2818;
const ZIMAGE_MAGIC_OFFSET: usize = 0x24;
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// Enough bytes to cover every magic offset above
const HEADER_LEN: u64 = 0x240;

const VERSION_BANNER: &[u8] = b"Linux version ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelImageKind {
    AndroidBoot,
    LinuxBzImage,
    Arm64Image,
    ArmZImage,
    Gzip,
    Unknown,
}

impl KernelImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelImageKind::AndroidBoot => "Android boot image",
            KernelImageKind::LinuxBzImage => "Linux kernel image (bzImage)",
            KernelImageKind::Arm64Image => "arm64 kernel Image",
            KernelImageKind::ArmZImage => "ARM zImage",
            KernelImageKind::Gzip => "gzip-compressed image",
            KernelImageKind::Unknown => "unknown",
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, KernelImageKind::Unknown)
    }
}

impl fmt::Display for KernelImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`validate_kernel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelReport {
    pub path: PathBuf,
    pub size: u64,
    pub kind: KernelImageKind,
    pub size_in_range: bool,
}

/// Classify a header by its magic values
pub fn classify_header(header: &[u8]) -> KernelImageKind {
    if header.starts_with(ANDROID_BOOT_MAGIC) {
        return KernelImageKind::AndroidBoot;
    }
    if magic_at(header, BZIMAGE_MAGIC_OFFSET, BZIMAGE_MAGIC) {
        return KernelImageKind::LinuxBzImage;
    }
    if magic_at(header, ARM64_IMAGE_MAGIC_OFFSET, ARM64_IMAGE_MAGIC) {
        return KernelImageKind::Arm64Image;
    }
    if magic_at(header, ZIMAGE_MAGIC_OFFSET, &ZIMAGE_MAGIC.to_le_bytes()) {
        return KernelImageKind::ArmZImage;
    }
    if header.starts_with(GZIP_MAGIC) {
        return KernelImageKind::Gzip;
    }
    KernelImageKind::Unknown
}

fn magic_at(header: &[u8], offset: usize, magic: &[u8]) -> bool {
    header
        .get(offset..offset + magic.len())
        .map(|window| window == magic)
        .unwrap_or(false)
}

/// Read the leading bytes of a file, short files included
pub fn read_header(path: &Path) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(HEADER_LEN as usize);
    File::open(path)?.take(HEADER_LEN).read_to_end(&mut header)?;
    Ok(header)
}

/// Check that a file looks like a kernel
///
/// Unrecognized headers and unusual sizes only warn; the image is still
/// accepted because vendor kernels come in many wrappers.
pub fn validate_kernel(path: &Path) -> Result<KernelReport> {
    if !path.exists() {
        return Err(EmungError::not_found(format!(
            "Kernel file not found: {}",
            path.display()
        )));
    }

    let size = fs::metadata(path)?.len();
    let size_in_range = (MIN_KERNEL_SIZE..=MAX_KERNEL_SIZE).contains(&size);
    if !size_in_range {
        warn!(
            "Kernel file size ({:.1}MB) is outside typical range (2MB-100MB). \
             This might not be a valid kernel file.",
            size as f64 / 1024.0 / 1024.0
        );
    }

    let header = read_header(path)?;
    let kind = classify_header(&header);
    if kind.is_recognized() {
        info!("Valid {} detected: {}", kind, path.display());
    } else {
        warn!(
            "Kernel file does not have standard Android or Linux headers: {}",
            path.display()
        );
    }

    Ok(KernelReport {
        path: path.to_path_buf(),
        size,
        kind,
        size_in_range,
    })
}

/// First file named `kernel` or ending in `.img`, walking in name order
pub fn find_kernel_file(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let name = entry.file_name().to_string_lossy();
            name == "kernel" || name.ends_with(".img")
        })
        .map(|entry| entry.into_path())
}

/// Every file under `dir` whose header identifies it as a kernel
///
/// Gzip streams only count when the file name suggests a kernel.
pub fn search_kernels(dir: &Path) -> Vec<(PathBuf, KernelImageKind)> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let kind = match read_header(entry.path()) {
            Ok(header) => classify_header(&header),
            Err(e) => {
                debug!("Error reading {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let keep = match kind {
            KernelImageKind::Unknown => false,
            KernelImageKind::Gzip => looks_like_kernel_name(&entry.file_name().to_string_lossy()),
            _ => true,
        };
        if keep {
            info!("Potential kernel file found: {}", entry.path().display());
            found.push((entry.into_path(), kind));
        }
    }

    if found.is_empty() {
        info!("No kernel file found under {}", dir.display());
    }
    found
}

fn looks_like_kernel_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["kernel", "image", "zimage", "vmlinu"]
        .iter()
        .any(|hint| lower.contains(hint))
}

/// Version string from the `Linux version ...` banner, if present
pub fn find_version_banner(data: &[u8]) -> Option<String> {
    let start = data
        .windows(VERSION_BANNER.len())
        .position(|window| window == VERSION_BANNER)?
        + VERSION_BANNER.len();

    let version: Vec<u8> = data[start..]
        .iter()
        .take_while(|b| b.is_ascii_graphic())
        .copied()
        .collect();

    if version.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&version).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn header_with(offset: usize, magic: &[u8]) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_LEN as usize];
        header[offset..offset + magic.len()].copy_from_slice(magic);
        header
    }

    #[test]
    fn test_classify_known_magics() {
        assert_eq!(classify_header(b"ANDROID!\0\0\0\0"), KernelImageKind::AndroidBoot);
        assert_eq!(
            classify_header(&header_with(0x202, b"HdrS")),
            KernelImageKind::LinuxBzImage
        );
        assert_eq!(
            classify_header(&header_with(0x38, b"ARM\x64")),
            KernelImageKind::Arm64Image
        );
        assert_eq!(
            classify_header(&header_with(0x24, &[0x18, 0x28, 0x6f, 0x01])),
            KernelImageKind::ArmZImage
        );
        assert_eq!(classify_header(&[0x1f, 0x8b, 0x08]), KernelImageKind::Gzip);
        assert_eq!(classify_header(b"hello"), KernelImageKind::Unknown);
        assert_eq!(classify_header(&[]), KernelImageKind::Unknown);
    }

    #[test]
    fn test_validate_missing_kernel() {
        let tmp = TempDir::new().unwrap();
        let err = validate_kernel(&tmp.path().join("nope.img")).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Kernel file not found"));
    }

    #[test]
    fn test_validate_accepts_unknown_small_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("weird.bin");
        fs::write(&path, b"not a kernel at all").unwrap();

        let report = validate_kernel(&path).unwrap();
        assert_eq!(report.kind, KernelImageKind::Unknown);
        assert!(!report.size_in_range);
        assert_eq!(report.size, 19);
    }

    #[test]
    fn test_validate_reads_past_sixteen_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bzImage");
        fs::write(&path, header_with(0x202, b"HdrS")).unwrap();

        let report = validate_kernel(&path).unwrap();
        assert_eq!(report.kind, KernelImageKind::LinuxBzImage);
    }

    #[test]
    fn test_find_kernel_file_prefers_name_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/boot")).unwrap();
        fs::create_dir_all(tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("a/readme.txt"), b"x").unwrap();
        fs::write(tmp.path().join("a/boot/kernel"), b"k").unwrap();
        fs::write(tmp.path().join("b/boot.img"), b"i").unwrap();

        let found = find_kernel_file(tmp.path()).unwrap();
        assert_eq!(found, tmp.path().join("a/boot/kernel"));
    }

    #[test]
    fn test_find_kernel_file_none() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        assert!(find_kernel_file(tmp.path()).is_none());
    }

    #[test]
    fn test_search_kernels_by_header() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("deep/er")).unwrap();
        fs::write(tmp.path().join("deep/er/boot.bin"), b"ANDROID!rest").unwrap();
        fs::write(tmp.path().join("photo.gz"), [0x1f, 0x8b, 0x08]).unwrap();
        fs::write(tmp.path().join("Image.gz"), [0x1f, 0x8b, 0x08]).unwrap();
        fs::write(tmp.path().join("notes.txt"), b"text").unwrap();

        let found = search_kernels(tmp.path());
        let names: Vec<String> = found
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Image.gz", "boot.bin"]);
        assert_eq!(found[1].1, KernelImageKind::AndroidBoot);
    }

    #[test]
    fn test_version_banner() {
        let data = b"\0\0junkLinux version 4.14.78-g1234 (build@host) #1 SMP";
        assert_eq!(find_version_banner(data).as_deref(), Some("4.14.78-g1234"));
        assert_eq!(find_version_banner(b"no banner here"), None);
        assert_eq!(find_version_banner(b"Linux version "), None);
    }
}
