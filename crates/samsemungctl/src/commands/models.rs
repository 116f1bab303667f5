//! Models command

use super::AppContext;
use anyhow::Result;
use samsemung_common::Architecture;
use samsemungctl::output::{header, section, table};

pub fn models(ctx: &AppContext) -> Result<()> {
    println!("{}", header("Supported Models"));

    let rows: Vec<Vec<String>> = ctx
        .settings
        .samsung_models
        .iter()
        .map(|(model, arch)| emulator_row(model, *arch))
        .collect();
    println!("{}", table(&["MODEL", "ARCH", "MACHINE", "CPU"], &rows));
    println!();

    println!("{}", section("UI versions"));
    for version in ctx.settings.ui_versions() {
        println!("  {}", version);
    }
    Ok(())
}

fn emulator_row(model: &str, arch: Architecture) -> Vec<String> {
    vec![
        model.to_string(),
        arch.to_string(),
        arch.machine().to_string(),
        arch.default_cpu().to_string(),
    ]
}
