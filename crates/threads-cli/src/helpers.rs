//! Shared helpers: tracing setup, config resolution and output.

use serde::Serialize;
use threads_store::StoreConfig;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the given default log level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Environment (after `.env`) with the command-line URL on top.
pub fn resolve_config(database_url: Option<String>) -> StoreConfig {
    match database_url.filter(|url| !url.trim().is_empty()) {
        Some(url) => StoreConfig::with_url(url),
        None => StoreConfig::from_env(),
    }
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
