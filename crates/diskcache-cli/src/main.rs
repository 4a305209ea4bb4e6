//! diskcache - command line front end for the disk cache.
//!
//! Opens a cache directory, dispatches method calls by name with JSON
//! params, prints one JSON response per call on stdout and persists the
//! index before exiting.

mod dispatch;
mod params;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diskcache::{CacheConfig, DiskCache};
use dispatch::{Request, Response};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "diskcache")]
#[command(about = "Disk-backed key/value cache with TTL expiry")]
struct Args {
    /// Cache directory (defaults to the platform cache dir)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Store values DEFLATE-compressed
    #[arg(long)]
    compress: bool,

    /// Maximum cache size in bytes
    #[arg(long, default_value_t = CacheConfig::DEFAULT_MAX_SIZE_BYTES)]
    max_size: u64,

    /// Rewrite the index after every mutation
    #[arg(long)]
    persist_on_write: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call one method, e.g. `call set '{"key":"a","value":1,"ttl":60}'`
    Call {
        method: String,
        /// JSON object of parameters
        params: Option<String>,
    },
    /// Read `{"method": ..., "params": ...}` objects from stdin, one per line
    Batch,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cache_dir = match args.dir {
        Some(dir) => dir,
        None => dirs::cache_dir()
            .context("No platform cache directory; pass --dir")?
            .join("diskcache"),
    };

    let cache = DiskCache::builder(&cache_dir)
        .compression(args.compress)
        .max_size_bytes(args.max_size)
        .persist_on_write(args.persist_on_write)
        .build()
        .with_context(|| format!("Failed to open cache at {}", cache_dir.display()))?;

    let failed = match args.command {
        Command::Call { method, params } => {
            let params = params
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("params must be a JSON object")?;
            let response = dispatch::handle(&cache, &Request { method, params });
            print_response(&response)?;
            response.is_error()
        }
        Command::Batch => run_batch(&cache)?,
    };

    cache.close().context("Failed to persist cache index")?;
    info!("Cache closed");

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Run newline-delimited requests from stdin. Returns whether any failed.
fn run_batch(cache: &DiskCache) -> Result<bool> {
    let stdin = std::io::stdin();
    let mut failed = false;

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch::handle(cache, &request),
            Err(e) => Response::error(&diskcache::CacheError::InvalidParams {
                message: format!("Malformed request: {}", e),
            }),
        };
        failed |= response.is_error();
        print_response(&response)?;
    }

    Ok(failed)
}

fn print_response(response: &Response) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    Ok(())
}
