//! Global virtual disk

use super::AppContext;
use anyhow::Result;
use samsemungctl::output::{status, Level};
use std::path::PathBuf;

const DEFAULT_DISK_NAME: &str = "virtual_disk.qcow2";

/// Create the shared disk and remember it in the settings
pub fn disk_create(ctx: &mut AppContext, size: Option<u64>, path: Option<PathBuf>) -> Result<()> {
    let size = size.unwrap_or(ctx.settings.virtual_disk_size);
    if size == 0 {
        anyhow::bail!("Disk size must be greater than zero");
    }

    let path = path
        .or_else(|| {
            let configured = ctx.settings.virtual_disk_path.trim();
            (!configured.is_empty()).then(|| PathBuf::from(configured))
        })
        .unwrap_or_else(|| ctx.dirs.root.join(DEFAULT_DISK_NAME));

    let created = ctx.controller().create_virtual_disk(&path, size)?;

    ctx.settings.virtual_disk_path = created.display().to_string();
    ctx.settings.virtual_disk_size = size;
    ctx.save_settings()?;

    println!(
        "{}",
        status(
            Level::Success,
            &format!("Virtual disk created at: {} ({} MB)", created.display(), size)
        )
    );
    Ok(())
}
