//! Built-in documentation

use anyhow::Result;
use samsemungctl::output::{header, section};

const GETTING_STARTED: &[&str] = &[
    "1. Point samsemungctl at QEMU: config set qemu_path=/path/to/qemu/bin",
    "2. Check the install: test --model \"Galaxy S10\"",
    "3. Create a virtual machine: vm new my-s10 --model \"Galaxy S10\"",
    "4. Boot it: start my-s10 (add --detach to keep the shell)",
];

const KERNEL_TYPES: &[&str] = &[
    "Default test kernel: pre-configured, good for first boots, limited hardware support",
    "Custom kernel: built for one device model, needs matching configuration",
    "Stock Samsung kernel: extracted from firmware, complete hardware support",
];

const KERNEL_FILES: &[&str] = &[
    "boot.img  Android boot image (kernel plus ramdisk)",
    "zImage    compressed 32-bit ARM kernel",
    "Image     raw arm64 kernel",
];

const KERNEL_PARAMS: &[&str] = &[
    "console=ttyAMA0              console on the first serial port",
    "root=/dev/vda                root filesystem on the virtio disk",
    "androidboot.hardware=qemu    tell Android it runs under QEMU",
];

const KERNEL_SOURCES: &[&str] = &[
    "Samsung Open Source Release Center (opensource.samsung.com): stock kernel trees per model",
    "LineageOS android_kernel_samsung_* repositories: Snapdragon (msm8996, sdm845) and Exynos trees",
    "AOSP goldfish kernels: emulator-friendly kernels for generic boots",
];

const NOTES: &[&str] = &[
    "Keep a backup of every kernel you flash or patch",
    "Match the kernel architecture to the model (see 'models')",
    "Keep kernel parameters consistent between runs",
];

pub fn docs() -> Result<()> {
    println!("{}", header("SamsEmung Documentation"));
    print_list("Getting started", GETTING_STARTED);
    print_list("Kernel types", KERNEL_TYPES);
    print_list("Kernel files", KERNEL_FILES);
    print_list("Kernel parameters", KERNEL_PARAMS);
    print_list("Kernel sources", KERNEL_SOURCES);
    print_list("Notes", NOTES);
    Ok(())
}

fn print_list(title: &str, lines: &[&str]) {
    println!();
    println!("{}", section(title));
    for line in lines {
        println!("  {}", line);
    }
}
