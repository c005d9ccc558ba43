//! qcinv
//!
//! Ansible dynamic inventory for Tencent Cloud CVM instances

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use qcinv_exec::LocalRunner;
use qcinv_inventory::{CacheManager, InventoryBuilder, QcloudClient};
use tracing_subscriber::EnvFilter;

mod config;
mod output;

/// Produce an Ansible inventory from Tencent Cloud
#[derive(Parser, Debug)]
#[command(name = "qcinv", version, about)]
struct Args {
    /// List instances (the default)
    #[arg(long)]
    list: bool,

    /// Print all variables of a single host
    #[arg(long, value_name = "NAME")]
    host: Option<String>,

    /// Rebuild the inventory from the API even if the cache is fresh
    #[arg(long)]
    refresh_cache: bool,

    /// Configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    init_tracing(args.verbose, args.log_json);
    tracing::debug!(list = args.list, host = ?args.host, refresh = args.refresh_cache, "starting");

    let config = Arc::new(config::load(args.config.as_deref())?);

    let cache = CacheManager::new(&config.cache).wrap_err("failed to prepare cache")?;
    let client = QcloudClient::new(Arc::new(LocalRunner::new()), config.fetch.clone());
    let builder = InventoryBuilder::new(client, Arc::clone(&config));

    let index = builder
        .load_or_build(&cache, args.refresh_cache)
        .await
        .map_err(|e| {
            let context = if e.is_cache_error() {
                "inventory cache is unusable (check cache.path or rerun with --refresh-cache)"
            } else {
                "failed to produce inventory"
            };
            eyre::Report::new(e).wrap_err(context)
        })?;

    let rendered = output::render(&index, args.host.as_deref())?;
    println!("{rendered}");

    Ok(())
}

/// Log to stderr; stdout carries the inventory
fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
