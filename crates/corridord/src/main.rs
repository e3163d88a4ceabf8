//! Corridor maintenance CLI (corridord)
//!
//! Housekeeping surface for the corridor stats cache:
//! - corridord sweep [--days N]     remove entries idle for N days (30)
//! - corridord stats                row counts for the cache database
//! - corridord check-config [path]  load config, print its effective hash
//!
//! Reads the config from ./corridor.toml unless a path is given.

use anyhow::{Context, Result};
use corridor_common::{Config, PersistentCache};
use std::env;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_CONFIG_PATH: &str = "corridor.toml";
const DEFAULT_SWEEP_DAYS: i64 = 30;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "corridord=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().without_time().with_target(false))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [] => run_help(),
        [cmd] if cmd == "--help" || cmd == "-h" => run_help(),
        [cmd] if cmd == "--version" || cmd == "-V" => {
            println!("corridord {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        [cmd] if cmd == "sweep" => run_sweep(DEFAULT_SWEEP_DAYS),
        [cmd, flag, days] if cmd == "sweep" && flag == "--days" => {
            let days: i64 = days
                .parse()
                .with_context(|| format!("invalid --days value '{days}'"))?;
            run_sweep(days)
        }
        [cmd] if cmd == "stats" => run_stats(),
        [cmd] if cmd == "check-config" => run_check_config(DEFAULT_CONFIG_PATH),
        [cmd, path] if cmd == "check-config" => run_check_config(path),
        _ => {
            eprintln!("unknown command: {}", args.join(" "));
            run_help()?;
            std::process::exit(2);
        }
    }
}

fn load_config() -> Config {
    match Config::load(DEFAULT_CONFIG_PATH) {
        Ok(config) => config,
        Err(_) => Config::default(),
    }
}

fn open_cache(config: &Config) -> Result<PersistentCache> {
    PersistentCache::open_at(&config.cache.database.path)
        .with_context(|| format!("cannot open cache at {}", config.cache.database.path))
}

fn run_sweep(days: i64) -> Result<()> {
    let config = load_config();
    let cache = open_cache(&config)?;
    let removed = cache.cleanup(days)?;
    println!(
        "sweep done: {} entries removed, {} dangling queries removed",
        removed.entries_removed, removed.queries_removed
    );
    Ok(())
}

fn run_stats() -> Result<()> {
    let config = load_config();
    let cache = open_cache(&config)?;
    let stats = cache.stats()?;
    println!("queries:      {}", stats.query_count);
    println!("entries:      {}", stats.entry_count);
    println!("placeholders: {}", stats.placeholder_count);
    Ok(())
}

fn run_check_config(path: &str) -> Result<()> {
    let config = Config::load(path)?;
    config
        .validate_corridor()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("config ok, hash {}", config.hash());
    Ok(())
}

fn run_help() -> Result<()> {
    println!("corridord - corridor cache maintenance");
    println!();
    println!("USAGE:");
    println!("  corridord sweep [--days N]      remove entries idle for N days (default 30)");
    println!("  corridord stats                 print cache row counts");
    println!("  corridord check-config [path]   validate a config file and print its hash");
    Ok(())
}
