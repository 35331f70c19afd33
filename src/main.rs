//! chunkhold - chunk-ticket reconciliation host
//!
//! Headless executable: loads or creates a save, activates the default world,
//! runs a fixed number of ticks and saves.

mod config;
mod headless;

use anyhow::Result;
use config::HostConfig;
use std::{env, path::PathBuf};
use tracing::info;

fn main() -> Result<()> {
    // Initialize tracing with INFO level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting chunkhold v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    let host = match cli.config.as_deref() {
        Some(path) => HostConfig::load_from_path(path),
        None => HostConfig::load(),
    };

    let save_dir = cli.save_dir.unwrap_or_else(|| host.host.save_dir.clone());
    let ticks = cli.ticks.unwrap_or(host.host.ticks);

    headless::run(headless::HeadlessConfig {
        host,
        save_dir,
        no_save: cli.no_save,
        ticks,
    })
}

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    config: Option<PathBuf>,
    ticks: Option<u64>,
    save_dir: Option<PathBuf>,
    no_save: bool,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    if let Some(path) = args.next() {
                        opts.config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--config requires a file path");
                    }
                }
                "--save-dir" => {
                    if let Some(path) = args.next() {
                        opts.save_dir = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--save-dir requires a directory path");
                    }
                }
                "--no-save" => opts.no_save = true,
                "--ticks" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<u64>() {
                            Ok(value) => opts.ticks = Some(value),
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--ticks must be an integer");
                            }
                        }
                    } else {
                        tracing::error!("--ticks requires an integer");
                    }
                }
                other => {
                    tracing::warn!(arg = other, "ignoring unknown argument");
                }
            }
        }

        opts
    }
}
