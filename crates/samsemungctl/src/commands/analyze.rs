//! Dump analysis command

use super::AppContext;
use anyhow::Result;
use samsemung_common::{DumpAnalyzer, EmungError};
use samsemungctl::output::{header, kv};
use std::path::PathBuf;

pub fn analyze(ctx: &AppContext, dir: Option<PathBuf>, json: bool) -> Result<()> {
    let folder = match dir {
        Some(dir) => dir,
        None if ctx.settings.dump_folder.trim().is_empty() => {
            anyhow::bail!("No dump folder selected")
        }
        None => PathBuf::from(ctx.settings.dump_folder.trim()),
    };
    if !folder.is_dir() {
        return Err(EmungError::not_found(format!(
            "Dump folder not found: {}",
            folder.display()
        ))
        .into());
    }

    let analysis = DumpAnalyzer::new(&folder).analyze()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("{}", header(&format!("Dump Analysis: {}", folder.display())));
    let device = analysis
        .device_model
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "Not found".to_string());
    println!("{}", kv("device_model", &device));
    println!("{}", kv("ui_version", &analysis.ui_version));
    println!("{}", kv("kernel", &analysis.kernel.to_string()));
    Ok(())
}
