//! Kernel and recovery image library
//!
//! Plain files under `kernels/` and `recovery/` in the data directory.

use crate::error::{EmungError, Result};
use crate::kernel::{classify_header, find_kernel_file, read_header, KernelImageKind};
use crate::paths::DataDirs;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub struct ImageLibrary {
    kernels: PathBuf,
    recovery: PathBuf,
}

impl ImageLibrary {
    pub fn new(dirs: &DataDirs) -> Self {
        Self {
            kernels: dirs.kernels.clone(),
            recovery: dirs.recovery.clone(),
        }
    }

    pub fn kernel_dir(&self) -> &Path {
        &self.kernels
    }

    pub fn recovery_dir(&self) -> &Path {
        &self.recovery
    }

    /// Copy a kernel archive into the library as is
    pub fn add_kernel(&self, zip_path: &Path) -> Result<PathBuf> {
        let dest = copy_into(zip_path, &self.kernels).map_err(|e| {
            error!("Error adding kernel zip: {}", e);
            e
        })?;
        info!("Kernel zip added: {}", dest.display());
        Ok(dest)
    }

    /// Extract an archive and keep only its kernel as `<stem>_kernel.img`
    pub fn add_kernel_from_zip(&self, zip_path: &Path) -> Result<PathBuf> {
        let result = self.extract_kernel(zip_path);
        if let Err(e) = &result {
            error!("Error adding kernel from zip: {}", e);
        }
        result
    }

    fn extract_kernel(&self, zip_path: &Path) -> Result<PathBuf> {
        let mut archive = zip::ZipArchive::new(File::open(zip_path)?)?;
        let scratch = tempfile::tempdir()?;
        archive.extract(scratch.path())?;

        let kernel = find_kernel_file(scratch.path())
            .ok_or_else(|| EmungError::KernelNotInArchive(zip_path.to_path_buf()))?;

        let stem = zip_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "kernel".to_string());
        fs::create_dir_all(&self.kernels)?;
        let dest = self.kernels.join(format!("{}_kernel.img", stem));
        fs::copy(&kernel, &dest)?;

        info!("Kernel extracted and added: {}", dest.display());
        Ok(dest)
    }

    /// Copy a TWRP recovery image into the library
    ///
    /// The Samsung identity step is logged only; the image bytes are left
    /// untouched.
    pub fn add_recovery(&self, img_path: &Path) -> Result<PathBuf> {
        let dest = copy_into(img_path, &self.recovery).map_err(|e| {
            error!("Error adding TWRP recovery: {}", e);
            e
        })?;

        if classify_header(&read_header(&dest)?) != KernelImageKind::AndroidBoot {
            warn!(
                "Recovery image does not start with an Android boot header: {}",
                dest.display()
            );
        }
        info!(
            "Modifying TWRP recovery to appear as Samsung device: {}",
            dest.display()
        );

        info!("TWRP recovery added: {}", dest.display());
        Ok(dest)
    }

    /// Kernel archives and images, sorted by name
    pub fn list_kernels(&self) -> Result<Vec<String>> {
        list_with_extensions(&self.kernels, &["zip", "img"])
    }

    /// Recovery images, sorted by name
    pub fn list_recoveries(&self) -> Result<Vec<String>> {
        list_with_extensions(&self.recovery, &["img"])
    }
}

fn copy_into(source: &Path, dir: &Path) -> Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        EmungError::not_found(format!("Not a file: {}", source.display()))
    })?;
    if !source.is_file() {
        return Err(EmungError::not_found(format!(
            "File not found: {}",
            source.display()
        )));
    }
    fs::create_dir_all(dir)?;
    let dest = dir.join(name);
    if is_same_file(source, &dest) {
        info!("{} is already in the library", dest.display());
        return Ok(dest);
    }
    fs::copy(source, &dest)?;
    Ok(dest)
}

/// `fs::copy` onto itself truncates the file
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn list_with_extensions(dir: &Path, extensions: &[&str]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !dir.exists() {
        return Ok(names);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let wanted = path
            .extension()
            .map(|ext| extensions.iter().any(|want| ext == *want))
            .unwrap_or(false);
        if wanted {
            if let Some(name) = path.file_name() {
                names.push(name.to_string_lossy().into_owned());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn library(tmp: &TempDir) -> ImageLibrary {
        let dirs = DataDirs::at(tmp.path().join("home"));
        dirs.ensure().unwrap();
        ImageLibrary::new(&dirs)
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_add_kernel_copies_archive() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        let zip = tmp.path().join("stock.zip");
        write_zip(&zip, &[("boot.img", b"ANDROID!")]);

        let dest = lib.add_kernel(&zip).unwrap();
        assert_eq!(dest, lib.kernel_dir().join("stock.zip"));
        assert_eq!(lib.list_kernels().unwrap(), vec!["stock.zip"]);
    }

    #[test]
    fn test_add_kernel_from_zip_extracts_nested_kernel() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        let zip = tmp.path().join("exynos9820.zip");
        write_zip(
            &zip,
            &[
                ("README.txt", b"flash me"),
                ("out/arch/arm64/boot/kernel", b"kernel bytes"),
            ],
        );

        let dest = lib.add_kernel_from_zip(&zip).unwrap();
        assert_eq!(dest, lib.kernel_dir().join("exynos9820_kernel.img"));
        assert_eq!(fs::read(&dest).unwrap(), b"kernel bytes");
    }

    #[test]
    fn test_add_kernel_from_zip_without_kernel() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        let zip = tmp.path().join("docs.zip");
        write_zip(&zip, &[("notes.txt", b"nothing here")]);

        let err = lib.add_kernel_from_zip(&zip).unwrap_err();
        assert!(matches!(err, EmungError::KernelNotInArchive(_)));
        assert!(err.to_string().contains("No kernel file found in the zip archive"));
        assert!(lib.list_kernels().unwrap().is_empty());
    }

    #[test]
    fn test_add_recovery_keeps_bytes() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        let img = tmp.path().join("twrp-3.7.0.img");
        fs::write(&img, b"ANDROID!recovery").unwrap();

        let dest = lib.add_recovery(&img).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"ANDROID!recovery");

        // Not an Android header: still added, only warned about
        let odd = tmp.path().join("odd.img");
        fs::write(&odd, b"garbage").unwrap();
        lib.add_recovery(&odd).unwrap();

        assert_eq!(lib.list_recoveries().unwrap(), vec!["odd.img", "twrp-3.7.0.img"]);
    }

    #[test]
    fn test_adding_a_library_file_keeps_it() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        let zip = lib.kernel_dir().join("stock.zip");
        write_zip(&zip, &[("boot.img", b"ANDROID!")]);
        let before = fs::read(&zip).unwrap();

        let dest = lib.add_kernel(&zip).unwrap();
        assert_eq!(dest, zip);
        assert_eq!(fs::read(&zip).unwrap(), before);

        let img = lib.recovery_dir().join("twrp.img");
        fs::write(&img, b"ANDROID!recovery").unwrap();
        // Same file through a path with a `..` detour
        let detour = lib.recovery_dir().join("..").join("recovery").join("twrp.img");
        lib.add_recovery(&detour).unwrap();
        assert_eq!(fs::read(&img).unwrap(), b"ANDROID!recovery");
    }

    #[test]
    fn test_missing_source() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        let err = lib.add_recovery(&tmp.path().join("absent.img")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_filters_extensions() {
        let tmp = TempDir::new().unwrap();
        let lib = library(&tmp);
        fs::write(lib.kernel_dir().join("b.img"), b"").unwrap();
        fs::write(lib.kernel_dir().join("a.zip"), b"").unwrap();
        fs::write(lib.kernel_dir().join("notes.txt"), b"").unwrap();
        fs::write(lib.recovery_dir().join("r.zip"), b"").unwrap();

        assert_eq!(lib.list_kernels().unwrap(), vec!["a.zip", "b.img"]);
        assert!(lib.list_recoveries().unwrap().is_empty());
    }
}
