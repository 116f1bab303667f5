//! Recovery image commands

use super::AppContext;
use anyhow::Result;
use samsemungctl::output::{header, status, Level};
use std::path::Path;

pub fn recovery_add(ctx: &AppContext, file: &Path) -> Result<()> {
    let dest = ctx.library().add_recovery(file)?;
    println!(
        "{}",
        status(Level::Success, &format!("Recovery image added: {}", dest.display()))
    );
    Ok(())
}

pub fn recovery_list(ctx: &AppContext) -> Result<()> {
    let images = ctx.library().list_recoveries()?;
    if images.is_empty() {
        println!("{}", status(Level::Info, "No recovery images in the library"));
        return Ok(());
    }
    println!("{}", header("Recovery Images"));
    for name in images {
        println!("  {}", name);
    }
    Ok(())
}
