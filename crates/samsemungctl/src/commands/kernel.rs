//! Kernel library commands

use super::AppContext;
use anyhow::Result;
use samsemung_common::kernel::search_kernels;
use samsemung_common::validate_kernel;
use samsemungctl::output::{header, kv, status, table, Level};
use std::path::Path;

pub fn kernel_add(ctx: &AppContext, file: &Path, extract: bool) -> Result<()> {
    let library = ctx.library();
    let dest = if extract {
        library.add_kernel_from_zip(file)?
    } else {
        library.add_kernel(file)?
    };
    println!(
        "{}",
        status(Level::Success, &format!("Kernel added: {}", dest.display()))
    );
    Ok(())
}

pub fn kernel_list(ctx: &AppContext) -> Result<()> {
    let library = ctx.library();
    let kernels = library.list_kernels()?;
    if kernels.is_empty() {
        println!("{}", status(Level::Info, "No kernels in the library"));
        return Ok(());
    }
    println!("{}", header("Kernels"));
    for name in kernels {
        println!("  {}", name);
    }
    println!("{}", kv("directory", &library.kernel_dir().display().to_string()));
    Ok(())
}

pub fn kernel_validate(file: &Path) -> Result<()> {
    let report = validate_kernel(file)?;

    println!("{}", header(&format!("Kernel: {}", report.path.display())));
    println!("{}", kv("type", report.kind.as_str()));
    println!(
        "{}",
        kv("size", &format!("{:.1} MB", report.size as f64 / 1024.0 / 1024.0))
    );

    if !report.size_in_range {
        println!(
            "{}",
            status(Level::Warning, "Size is outside the typical 2MB-100MB range")
        );
    }
    if report.kind.is_recognized() {
        println!("{}", status(Level::Success, "Kernel header recognized"));
    } else {
        println!(
            "{}",
            status(
                Level::Warning,
                "No standard Android or Linux header found; the image may still boot"
            )
        );
    }
    Ok(())
}

pub fn kernel_find(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(samsemung_common::EmungError::not_found(format!(
            "Directory not found: {}",
            dir.display()
        ))
        .into());
    }

    let found = search_kernels(dir);
    if found.is_empty() {
        println!("{}", status(Level::Info, "No kernel file found"));
        return Ok(());
    }

    let rows: Vec<Vec<String>> = found
        .iter()
        .map(|(path, kind)| vec![kind.to_string(), path.display().to_string()])
        .collect();
    println!("{}", table(&["TYPE", "PATH"], &rows));
    Ok(())
}
