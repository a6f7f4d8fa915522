//! sfxkit builder binary

use anyhow::{Context, bail};
use clap::Parser;
use log::LevelFilter;
use sfxkit::exit_codes::{EXIT_BUILD_ERROR, EXIT_INVALID_ARGS, EXIT_PANIC, EXIT_SUCCESS};
use sfxkit::{PackagerOptions, SfxError, build_installer, inspect_installer};
use std::{panic, path::PathBuf, process};

const VERSION: &str = sfxkit::version::VERSION;

#[derive(Parser, Debug)]
#[command(version = VERSION, about = "Build self-extracting installers")]
struct Args {
    /// Path to the installer stub binary
    #[arg(long)]
    stub: PathBuf,

    /// Application binary to embed
    #[arg(short, long)]
    payload: PathBuf,

    /// Output path for the setup binary
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, default_value = "")]
    product_name: String,

    /// Installed executable name (defaults to the payload file name)
    #[arg(long, default_value = "")]
    exe_name: String,

    /// Forced install directory on the target machine
    #[arg(long, default_value = "")]
    install_dir: String,

    #[arg(long, default_value = "")]
    product_version: String,

    /// Shortcut display name (defaults to the product name)
    #[arg(long, default_value = "")]
    shortcut_name: String,

    #[arg(long)]
    no_desktop_shortcut: bool,

    #[arg(long)]
    no_start_menu_shortcut: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    // Set up panic handler to return specific exit code
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        process::exit(EXIT_PANIC);
    }));

    let result = panic::catch_unwind(run);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in builder");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    let args = Args::parse();

    match args.log_level {
        Some(ref level) => {
            sfxkit::logger::JsonLogger::init_with_level(level, LevelFilter::Info);
        }
        None => {
            sfxkit::logger::JsonLogger::init(LevelFilter::Info);
        }
    }

    if let Err(e) = check_inputs(&args) {
        eprintln!("Error: {e:#}");
        return EXIT_INVALID_ARGS;
    }

    match build(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Build error: {e:#}");
            e.downcast_ref::<SfxError>()
                .map(SfxError::exit_code)
                .unwrap_or(EXIT_BUILD_ERROR)
        }
    }
}

fn check_inputs(args: &Args) -> anyhow::Result<()> {
    if !args.stub.is_file() {
        bail!("stub not found: {}", args.stub.display());
    }
    if !args.payload.is_file() {
        bail!("payload not found: {}", args.payload.display());
    }
    Ok(())
}

fn build(args: &Args) -> anyhow::Result<()> {
    let options = PackagerOptions {
        product_name: args.product_name.clone(),
        exe_name: args.exe_name.clone(),
        install_dir: args.install_dir.clone(),
        create_desktop_shortcut: !args.no_desktop_shortcut,
        create_start_menu_shortcut: !args.no_start_menu_shortcut,
        version: args.product_version.clone(),
        shortcut_name: args.shortcut_name.clone(),
    };

    let summary = build_installer(&args.stub, &args.payload, &args.output, &options)
        .with_context(|| format!("building {}", args.output.display()))?;

    // Read the result back before reporting success
    let info = inspect_installer(&summary.output)
        .with_context(|| format!("verifying {}", summary.output.display()))?;

    println!("✅ Created {}", summary.output.display());
    println!("   stub:    {} bytes", summary.stub_len);
    println!("   archive: {} bytes ({})", summary.archive_len, summary.archive_sha256);
    println!("   total:   {} bytes", summary.total_len);
    for (name, len) in &info.entries {
        println!("   - {name} ({len} bytes)");
    }
    Ok(())
}
