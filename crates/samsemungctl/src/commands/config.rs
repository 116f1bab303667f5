//! Config command

use super::{or_none, AppContext};
use anyhow::Result;
use samsemung_common::Architecture;
use samsemungctl::output::{header, kv, section, status, Level};

pub fn config_show(ctx: &AppContext) -> Result<()> {
    let s = &ctx.settings;

    println!("{}", header("SamsEmung Configuration"));
    println!("{}", kv("file", &ctx.config_path.display().to_string()));
    println!();

    println!("{}", section("QEMU"));
    println!("{}", kv("qemu_path", or_none(&s.qemu_path)));
    println!("{}", kv("qemu_executable", or_none(&s.qemu_executable)));
    println!("{}", kv("kernel_params", s.kernel_params().unwrap_or("(none)")));
    println!("{}", kv("boot_img_path", or_none(&s.boot_img_path)));
    println!();

    println!("{}", section("Storage"));
    println!("{}", kv("virtual_disk_path", or_none(&s.virtual_disk_path)));
    println!("{}", kv("virtual_disk_size", &format!("{} MB", s.virtual_disk_size)));
    println!("{}", kv("dump_folder", or_none(&s.dump_folder)));
    println!("{}", kv("data_dir", &ctx.dirs.root.display().to_string()));
    println!();

    println!("{}", section("General"));
    println!("{}", kv("log_level", &s.log_level));
    println!("{}", kv("models", &s.samsung_models.len().to_string()));
    println!("{}", kv("ui_versions", &s.ui_versions().join(", ")));
    if !s.extra.is_empty() {
        let keys: Vec<&str> = s.extra.keys().map(String::as_str).collect();
        println!("{}", kv("other keys", &keys.join(", ")));
    }

    Ok(())
}

pub fn config_path(ctx: &AppContext) -> Result<()> {
    println!("{}", ctx.config_path.display());
    Ok(())
}

/// `key=value`
pub fn config_set(ctx: &mut AppContext, assignment: &str) -> Result<()> {
    let (key, value) = match assignment.split_once('=') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => anyhow::bail!("Invalid format. Use: key=value"),
    };

    ctx.settings.set(key, value)?;
    ctx.save_settings()?;
    println!("{}", status(Level::Success, &format!("Set {} = {}", key, value)));
    Ok(())
}

pub fn config_set_model(ctx: &mut AppContext, model: &str, arch: &str) -> Result<()> {
    let arch: Architecture = arch.parse()?;
    ctx.settings.set_model(model, arch)?;
    ctx.save_settings()?;
    println!(
        "{}",
        status(Level::Success, &format!("Model '{}' runs as {}", model.trim(), arch))
    );
    Ok(())
}
