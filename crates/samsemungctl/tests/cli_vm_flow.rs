//! VM profile flow through the CLI with a stand-in qemu-img
//!
//! One test per file: the script must not be open for writing while a
//! parallel test forks.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run(tmp: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_samsemungctl"))
        .args(args)
        .env("SAMSEMUNG_HOME", tmp.path().join("home"))
        .env("SAMSEMUNG_CONFIG", tmp.path().join("config.json"))
        .env_remove("SAMSEMUNG_LOG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run samsemungctl")
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn test_vm_flow() {
    let tmp = TempDir::new().unwrap();
    let bin = tmp.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let qemu_img = bin.join("qemu-img");
    fs::write(&qemu_img, "#!/bin/sh\n: > \"$4\"\n").unwrap();
    fs::set_permissions(&qemu_img, fs::Permissions::from_mode(0o755)).unwrap();

    let assignment = format!("qemu_path={}", bin.display());
    assert!(run(&tmp, &["config", "set", &assignment]).status.success());

    // Shared disk
    let output = run(&tmp, &["disk", "create", "--size", "2048"]);
    assert!(output.status.success(), "stderr: {}", text(&output.stderr));
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("config.json")).unwrap())
            .unwrap();
    assert_eq!(saved["virtual_disk_size"], 2048);
    assert!(saved["virtual_disk_path"]
        .as_str()
        .unwrap()
        .ends_with("virtual_disk.qcow2"));

    // Out-of-range memory is a usage error
    let output = run(&tmp, &["vm", "new", "tiny", "--memory", "256"]);
    assert_eq!(output.status.code(), Some(64));

    let output = run(
        &tmp,
        &[
            "vm",
            "new",
            "my-s10",
            "--model",
            "Galaxy S10",
            "--memory",
            "4096",
            "--kernel-params",
            "console=ttyAMA0 root=/dev/vda",
        ],
    );
    assert!(output.status.success(), "stderr: {}", text(&output.stderr));
    assert!(tmp.path().join("home/vms/my-s10.qcow2").exists());

    let output = run(&tmp, &["vm", "list"]);
    assert!(text(&output.stdout).contains("my-s10"));

    let output = run(&tmp, &["vm", "show", "my-s10", "--json"]);
    let profile: serde_json::Value = serde_json::from_str(&text(&output.stdout)).unwrap();
    assert_eq!(profile["memory"], 4096);
    assert_eq!(profile["use_default_kernel"], true);

    let output = run(&tmp, &["vm", "cmdline", "my-s10"]);
    assert!(output.status.success(), "stderr: {}", text(&output.stderr));
    let line = text(&output.stdout);
    assert!(line.contains("qemu-system-aarch64 -machine type=virt -cpu cortex-a57 -smp 2 -m 4096M"));
    assert!(line.contains("-append 'console=ttyAMA0 root=/dev/vda'"));

    // Dump analysis feeds model and UI version
    let dump = tmp.path().join("dump");
    fs::create_dir_all(dump.join("system")).unwrap();
    fs::write(
        dump.join("system/build.prop"),
        "ro.product.model=SM-G973F\nro.build.version.oneui=20500\n",
    )
    .unwrap();
    let output = run(
        &tmp,
        &["vm", "new", "detected", "--auto-detect", "--dump-folder", dump.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr: {}", text(&output.stderr));
    let output = run(&tmp, &["vm", "show", "detected", "--json"]);
    let profile: serde_json::Value = serde_json::from_str(&text(&output.stdout)).unwrap();
    assert_eq!(profile["model"], "Other");
    assert_eq!(profile["ui_version"], "One UI 2.5");

    // Deleting needs confirmation
    let output = run(&tmp, &["vm", "delete", "my-s10"]);
    assert!(!output.status.success());
    assert!(text(&output.stderr).contains("--yes"));

    let output = run(&tmp, &["vm", "delete", "my-s10", "--yes"]);
    assert!(output.status.success(), "stderr: {}", text(&output.stderr));
    assert!(!tmp.path().join("home/vms/my-s10.qcow2").exists());
    let output = run(&tmp, &["vm", "list"]);
    assert!(!text(&output.stdout).contains("my-s10"));
}
