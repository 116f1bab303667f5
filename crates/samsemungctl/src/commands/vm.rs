//! VM profile commands

use super::{or_none, AppContext};
use anyhow::Result;
use samsemung_common::dump::UNKNOWN;
use samsemung_common::{analyze_dump, validate_kernel, VmProfile};
use samsemungctl::output::{header, kv, section, status, table, Level};
use std::path::{Path, PathBuf};
use tracing::info;

/// Model name used when a dump names a device the table does not know
const OTHER_MODEL: &str = "Other";

/// Options for `vm new`
#[derive(Debug, Clone)]
pub struct NewVm {
    pub name: String,
    pub model: String,
    pub ui_version: String,
    pub memory: u32,
    pub cpus: u32,
    pub disk_size: u64,
    pub kernel: Option<PathBuf>,
    pub recovery: Option<PathBuf>,
    pub kernel_params: Option<String>,
    pub dump_folder: Option<PathBuf>,
    pub auto_detect: bool,
}

pub fn vm_new(ctx: &AppContext, opts: NewVm) -> Result<()> {
    let mut model = opts.model;
    let mut ui_version = opts.ui_version;

    if opts.auto_detect {
        let folder = opts
            .dump_folder
            .clone()
            .or_else(|| {
                let configured = ctx.settings.dump_folder.trim();
                (!configured.is_empty()).then(|| PathBuf::from(configured))
            })
            .ok_or_else(|| anyhow::anyhow!("No dump folder selected"))?;

        let (detected_model, detected_ui) = analyze_dump(&folder)?;
        model = if ctx.settings.samsung_models.contains_key(&detected_model) {
            detected_model
        } else {
            info!("Detected model '{}' is not in the model table", detected_model);
            OTHER_MODEL.to_string()
        };
        if detected_ui != UNKNOWN {
            ui_version = detected_ui;
        }
        println!(
            "{}",
            status(Level::Info, &format!("Detected {} / {}", model, ui_version))
        );
    }

    if let Some(kernel) = &opts.kernel {
        validate_kernel(kernel)?;
    }

    let profile = VmProfile {
        name: opts.name,
        model,
        ui_version,
        memory: opts.memory,
        cpus: opts.cpus,
        use_default_kernel: opts.kernel.is_none(),
        kernel_path: path_string(opts.kernel.as_deref()),
        recovery_img: path_string(opts.recovery.as_deref()),
        disk_size: opts.disk_size,
        virtual_disk_path: String::new(),
        dump_folder: opts.dump_folder.map(|p| p.display().to_string()),
        kernel_params: opts.kernel_params,
        created_at: None,
    };

    let store = ctx.vms()?;
    let profile = store.create(profile, &ctx.controller())?;

    println!(
        "{}",
        status(
            Level::Success,
            &format!("Virtual machine '{}' created", profile.name)
        )
    );
    println!("{}", kv("disk", &profile.virtual_disk_path));
    Ok(())
}

pub fn vm_list(ctx: &AppContext) -> Result<()> {
    let store = ctx.vms()?;
    let names = store.list()?;
    if names.is_empty() {
        println!("{}", status(Level::Info, "No virtual machines yet. Create one with 'vm new'."));
        return Ok(());
    }

    let mut rows = Vec::new();
    for name in names {
        let row = match store.load(&name) {
            Ok(p) => vec![
                p.name,
                p.model,
                p.ui_version,
                format!("{} MB", p.memory),
                p.cpus.to_string(),
            ],
            Err(e) => vec![name, format!("unreadable: {}", e)],
        };
        rows.push(row);
    }
    println!("{}", table(&["NAME", "MODEL", "UI", "MEMORY", "CPUS"], &rows));
    Ok(())
}

pub fn vm_show(ctx: &AppContext, name: &str, json: bool) -> Result<()> {
    let profile = ctx.vms()?.load(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("{}", header(&format!("Virtual Machine: {}", profile.name)));
    println!("{}", section("Device"));
    println!("{}", kv("model", &profile.model));
    println!("{}", kv("ui_version", &profile.ui_version));
    println!("{}", kv("dump_folder", profile.dump_folder.as_deref().unwrap_or("(none)")));
    println!();
    println!("{}", section("Hardware"));
    println!("{}", kv("memory", &format!("{} MB", profile.memory)));
    println!("{}", kv("cpus", &profile.cpus.to_string()));
    println!("{}", kv("disk", or_none(&profile.virtual_disk_path)));
    println!("{}", kv("disk_size", &format!("{} MB", profile.disk_size)));
    println!();
    println!("{}", section("Boot"));
    let kernel = if profile.use_default_kernel && profile.kernel().is_none() {
        "default"
    } else {
        or_none(&profile.kernel_path)
    };
    println!("{}", kv("kernel", kernel));
    println!("{}", kv("recovery", or_none(&profile.recovery_img)));
    println!("{}", kv("kernel_params", profile.kernel_params.as_deref().unwrap_or("(none)")));
    if let Some(created) = profile.created_at {
        println!("{}", kv("created", &created.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
    }
    Ok(())
}

pub fn vm_import(ctx: &AppContext, file: &Path) -> Result<()> {
    let profile = ctx.vms()?.import(file)?;
    println!(
        "{}",
        status(Level::Success, &format!("Virtual machine '{}' imported", profile.name))
    );
    Ok(())
}

pub fn vm_delete(ctx: &AppContext, name: &str, yes: bool) -> Result<()> {
    let store = ctx.vms()?;
    // Fail on unknown names before asking for confirmation
    store.load(name)?;
    if !yes {
        anyhow::bail!(
            "Refusing to delete '{}' without --yes (the profile and its disk are removed)",
            name
        );
    }
    if ctx.controller().registry().live(name)?.is_some() {
        anyhow::bail!("'{}' is running. Stop it first.", name);
    }

    for warning in store.delete(name)? {
        println!("{}", status(Level::Warning, &warning));
    }
    println!(
        "{}",
        status(Level::Success, &format!("Virtual machine '{}' deleted", name))
    );
    Ok(())
}

pub fn vm_cmdline(ctx: &AppContext, name: &str) -> Result<()> {
    let profile = ctx.vms()?.load(name)?;
    println!("{}", ctx.controller().command_line(&profile)?);
    Ok(())
}

fn path_string(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}
