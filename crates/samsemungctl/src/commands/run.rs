//! Emulator lifecycle commands

use super::AppContext;
use anyhow::Result;
use chrono::Utc;
use samsemung_common::qemu::{StartMode, StartOutcome};
use samsemungctl::output::{header, kv, status as line, table, Level};
use std::path::Path;

pub async fn start(ctx: &AppContext, name: &str, detach: bool) -> Result<()> {
    let profile = ctx.vms()?.load(name)?;
    let controller = ctx.controller();
    let mode = if detach {
        StartMode::Detached
    } else {
        StartMode::Foreground
    };

    println!("{}", kv("command", &controller.command_line(&profile)?));
    if mode == StartMode::Foreground {
        println!("{}", line(Level::Info, "Press Ctrl-C to stop the emulator"));
    }

    match controller.start(&profile, mode).await? {
        StartOutcome::Detached { pid } => {
            println!(
                "{}",
                line(Level::Success, &format!("Started '{}' in the background (pid {})", name, pid))
            );
            println!(
                "{}",
                kv("log", &controller.registry().log_path(name).display().to_string())
            );
        }
        StartOutcome::Interrupted => {
            println!("{}", line(Level::Success, "Stopped QEMU emulator"));
        }
        StartOutcome::Exited { code: Some(0) } => {
            println!("{}", line(Level::Success, "Emulator exited"));
        }
        StartOutcome::Exited { code } => {
            let code = code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string());
            anyhow::bail!("Emulator for '{}' exited with status {}", name, code);
        }
    }
    Ok(())
}

pub async fn stop(ctx: &AppContext, name: &str) -> Result<()> {
    if ctx.controller().stop(name).await? {
        println!("{}", line(Level::Success, "Stopped QEMU emulator"));
    } else {
        println!("{}", line(Level::Warning, "No running emulator to stop"));
    }
    Ok(())
}

pub fn status(ctx: &AppContext, json: bool) -> Result<()> {
    let statuses = ctx.controller().status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("{}", header("Emulator Status"));
    if statuses.is_empty() {
        println!("{}", line(Level::Info, "No emulators running"));
        return Ok(());
    }

    let now = Utc::now();
    let rows: Vec<Vec<String>> = statuses
        .iter()
        .map(|s| {
            let uptime = (now - s.state.started_at).num_seconds().max(0);
            vec![
                s.state.vm.clone(),
                s.state.pid.to_string(),
                if s.alive { "running" } else { "exited (pruned)" }.to_string(),
                format!("{}s", uptime),
                if s.state.detached { "detached" } else { "foreground" }.to_string(),
            ]
        })
        .collect();
    println!("{}", table(&["VM", "PID", "STATE", "UPTIME", "MODE"], &rows));
    Ok(())
}

pub async fn test(ctx: &AppContext, model: &str, memory: u32) -> Result<()> {
    println!("{}", line(Level::Info, &format!("Testing emulator for {} ({} MB)", model, memory)));
    let cmd = ctx.controller().test_emulator(model, memory).await?;
    println!("{}", kv("command", &cmd.command_line()));
    println!("{}", line(Level::Success, "Emulator test passed"));
    Ok(())
}

pub async fn dump(ctx: &AppContext, name: &str, output: &Path) -> Result<()> {
    let path = ctx.controller().create_dump(name, output).await?;
    println!(
        "{}",
        line(Level::Success, &format!("Dump file created at: {}", path.display()))
    );
    Ok(())
}
