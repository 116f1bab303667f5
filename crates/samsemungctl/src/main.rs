//! SamsEmung Control - command line front end for Samsung device emulation
//!
//! Drives QEMU through the samsemung_common library: settings, VM profiles,
//! the kernel/recovery library, emulator lifecycle and dump analysis.

mod commands;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use commands::{AppContext, NewVm};
use samsemungctl::errors::{exit_code, EXIT_SUCCESS};
use samsemungctl::logging;
use samsemungctl::output::{status, Level};
use std::path::PathBuf;

// Version is embedded at build time
const VERSION: &str = env!("SAMSEMUNG_VERSION");

#[derive(Parser)]
#[command(name = "samsemungctl")]
#[command(about = "SamsEmung - Samsung device emulation on top of QEMU", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Settings file (default: $SAMSEMUNG_CONFIG or the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or edit settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List device models, their architectures and UI versions
    Models,

    /// Manage the shared virtual disk
    Disk {
        #[command(subcommand)]
        action: DiskAction,
    },

    /// Manage virtual machine profiles
    Vm {
        #[command(subcommand)]
        action: VmAction,
    },

    /// Boot a virtual machine
    Start {
        name: String,

        /// Return once QEMU is running instead of waiting for it
        #[arg(long)]
        detach: bool,
    },

    /// Stop a running virtual machine
    Stop { name: String },

    /// Show running emulators
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Smoke-test the QEMU install with a headless boot
    Test {
        #[arg(long, default_value = "Galaxy S10")]
        model: String,

        /// Guest memory in MB
        #[arg(long, default_value_t = 1024)]
        memory: u32,
    },

    /// Write guest memory of a running VM to a file
    Dump { name: String, output: PathBuf },

    /// Manage kernel images
    Kernel {
        #[command(subcommand)]
        action: KernelAction,
    },

    /// Manage TWRP recovery images
    Recovery {
        #[command(subcommand)]
        action: RecoveryAction,
    },

    /// Read device model, UI version and kernel from a firmware dump
    Analyze {
        /// Dump folder (default: dump_folder from the settings)
        dir: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Kernel notes and getting-started help
    Docs,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print all settings
    Show,
    /// Print the settings file location
    Path,
    /// Set a configuration value (key=value)
    Set { assignment: String },
    /// Add or change a model's architecture (arm, arm64, x86_64)
    SetModel { model: String, arch: String },
}

#[derive(Subcommand)]
enum DiskAction {
    /// Create a qcow2 disk and record it in the settings
    Create {
        /// Size in MB (default: virtual_disk_size)
        #[arg(long)]
        size: Option<u64>,

        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum VmAction {
    /// Create a virtual machine and its disk
    New(NewVmArgs),
    /// List virtual machines
    List,
    /// Show a virtual machine profile
    Show {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Import a profile JSON file
    Import { file: PathBuf },
    /// Delete a virtual machine and its disk
    Delete {
        name: String,
        #[arg(long)]
        yes: bool,
    },
    /// Print the QEMU command line for a virtual machine
    Cmdline { name: String },
}

#[derive(Args)]
struct NewVmArgs {
    name: String,

    #[arg(long, default_value = "Galaxy S10")]
    model: String,

    #[arg(long, default_value = "One UI 3.0")]
    ui_version: String,

    /// Guest memory in MB (1024-16384)
    #[arg(long, default_value_t = 2048)]
    memory: u32,

    /// Processors (1-8)
    #[arg(long, default_value_t = 2)]
    cpus: u32,

    /// Disk size in MB (4096-102400)
    #[arg(long, default_value_t = 8192)]
    disk_size: u64,

    /// Custom kernel image instead of the default kernel
    #[arg(long)]
    kernel: Option<PathBuf>,

    /// TWRP recovery image passed as initrd
    #[arg(long)]
    recovery: Option<PathBuf>,

    #[arg(long)]
    kernel_params: Option<String>,

    /// Firmware dump folder for this device
    #[arg(long, alias = "dump")]
    dump_folder: Option<PathBuf>,

    /// Take model and UI version from the dump folder
    #[arg(long)]
    auto_detect: bool,
}

#[derive(Subcommand)]
enum KernelAction {
    /// Add a kernel archive to the library
    Add {
        file: PathBuf,

        /// Extract the kernel from the archive instead of copying the zip
        #[arg(long)]
        extract: bool,
    },
    /// List kernels in the library
    List,
    /// Check a kernel image header and size
    Validate { file: PathBuf },
    /// Search a directory tree for kernel images
    Find { dir: PathBuf },
}

#[derive(Subcommand)]
enum RecoveryAction {
    /// Add a TWRP recovery image to the library
    Add { file: PathBuf },
    /// List recovery images in the library
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("{}", status(Level::Error, &format!("{:#}", e)));
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let mut ctx = AppContext::load(cli.config.as_deref())?;
    logging::init(cli.verbose, &ctx.settings.log_level);

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&ctx),
            ConfigAction::Path => commands::config_path(&ctx),
            ConfigAction::Set { assignment } => commands::config_set(&mut ctx, &assignment),
            ConfigAction::SetModel { model, arch } => {
                commands::config_set_model(&mut ctx, &model, &arch)
            }
        },
        Commands::Models => commands::models(&ctx),
        Commands::Disk { action } => match action {
            DiskAction::Create { size, path } => commands::disk_create(&mut ctx, size, path),
        },
        Commands::Vm { action } => match action {
            VmAction::New(args) => commands::vm_new(&ctx, args.into()),
            VmAction::List => commands::vm_list(&ctx),
            VmAction::Show { name, json } => commands::vm_show(&ctx, &name, json),
            VmAction::Import { file } => commands::vm_import(&ctx, &file),
            VmAction::Delete { name, yes } => commands::vm_delete(&ctx, &name, yes),
            VmAction::Cmdline { name } => commands::vm_cmdline(&ctx, &name),
        },
        Commands::Start { name, detach } => commands::start(&ctx, &name, detach).await,
        Commands::Stop { name } => commands::stop(&ctx, &name).await,
        Commands::Status { json } => commands::status(&ctx, json),
        Commands::Test { model, memory } => commands::test(&ctx, &model, memory).await,
        Commands::Dump { name, output } => commands::dump(&ctx, &name, &output).await,
        Commands::Kernel { action } => match action {
            KernelAction::Add { file, extract } => commands::kernel_add(&ctx, &file, extract),
            KernelAction::List => commands::kernel_list(&ctx),
            KernelAction::Validate { file } => commands::kernel_validate(&file),
            KernelAction::Find { dir } => commands::kernel_find(&dir),
        },
        Commands::Recovery { action } => match action {
            RecoveryAction::Add { file } => commands::recovery_add(&ctx, &file),
            RecoveryAction::List => commands::recovery_list(&ctx),
        },
        Commands::Analyze { dir, json } => commands::analyze(&ctx, dir, json),
        Commands::Docs => commands::docs(),
    }
}

impl From<NewVmArgs> for NewVm {
    fn from(args: NewVmArgs) -> Self {
        NewVm {
            name: args.name,
            model: args.model,
            ui_version: args.ui_version,
            memory: args.memory,
            cpus: args.cpus,
            disk_size: args.disk_size,
            kernel: args.kernel,
            recovery: args.recovery,
            kernel_params: args.kernel_params,
            dump_folder: args.dump_folder,
            auto_detect: args.auto_detect,
        }
    }
}
