//! Gallery Ingest - CLI Entry Point
//!
//! This binary is a thin wrapper around the library, handling argument
//! parsing, logging setup, the shutdown signal, and command dispatch.

use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use gallery_ingest::cli::{self, Args};
use gallery_ingest::core::config::Config;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(ref config_path) = args.config {
        match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                Config::default()
            }
        }
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Apply CLI overrides to config
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }

    // Set up graceful shutdown handler
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();

    ctrlc::set_handler(move || {
        if shutdown_flag_clone.load(Ordering::SeqCst) {
            // Second Ctrl+C - force exit
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(1);
        } else {
            shutdown_flag_clone.store(true, Ordering::SeqCst);
            eprintln!("\nGraceful shutdown requested. Finishing current item... (Press Ctrl+C again to force quit)");
        }
    })
    .expect("Failed to set Ctrl+C handler");

    // Initialize logger; RUST_LOG still wins over the config level
    Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level)).init();

    info!("gallery-ingest v{}", gallery_ingest::VERSION);

    cli::run_command(&args, &config, shutdown_flag)?;

    Ok(())
}
