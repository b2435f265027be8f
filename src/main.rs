//! devlink - keep one USB device session alive
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use devlink::RunOptions;
use devlink_app::config::{
    default_config_path, init_config_file, load_default_settings, load_settings,
};

/// devlink - connect, probe and watch a single USB device over ADB
#[derive(Parser, Debug)]
#[command(name = "devlink")]
#[command(about = "Connect, probe and watch a single USB device over ADB", long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Print NDJSON events instead of human-readable lines
    #[arg(long)]
    json: bool,

    /// Print every probe reading, not only state changes
    #[arg(long)]
    readings: bool,

    /// Connect to this serial on startup
    #[arg(long, value_name = "SERIAL", conflicts_with = "select")]
    serial: Option<String>,

    /// Choose a device from the attached ones on startup
    #[arg(long)]
    select: bool,

    /// Do not connect automatically on startup or when a device is attached
    #[arg(long)]
    no_auto_connect: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if args.init_config {
        let Some(path) = args.config.clone().or_else(default_config_path) else {
            eprintln!("No config directory available; pass --config PATH");
            std::process::exit(1);
        };
        if init_config_file(&path)? {
            eprintln!("Wrote default config to {}", path.display());
        } else {
            eprintln!("Config already exists at {}", path.display());
        }
        return Ok(());
    }

    devlink_core::logging::init()?;

    let mut settings = match &args.config {
        Some(path) => load_settings(path),
        None => load_default_settings(),
    };
    if args.no_auto_connect {
        settings.session.auto_connect = false;
    }

    let options = RunOptions {
        json: args.json,
        readings: args.readings,
        serial: args.serial,
        select: args.select,
    };
    devlink::run(settings, options).await?;
    Ok(())
}
