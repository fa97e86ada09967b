use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

mod ai;
mod app;
mod config;
mod db;
mod error;
mod generators;
mod media;
mod models;
mod services;
mod sql;
mod storage;

#[cfg(test)]
mod testing;

use app::Services;
use config::Config;
use error::Result;
use generators::GeneratorKind;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging at info until the configured level is known
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::load().inspect_err(|e| tracing::error!("Configuration error: {}", e))?;

    // RUST_LOG overrides the configured level
    if !from_env {
        if let Err(e) = filter_handle.reload(EnvFilter::new(&config.log_level)) {
            tracing::warn!("Could not apply log level {}: {}", config.log_level, e);
        }
    }

    // Generator names on the command line replace the configured sequence
    let args: Vec<String> = std::env::args().skip(1).collect();
    let sequence = if args.is_empty() {
        config.generator_sequence()?
    } else {
        args.iter()
            .map(|name| name.parse::<GeneratorKind>())
            .collect::<Result<Vec<_>>>()?
    };

    let services = Services::new(config)?;
    app::run_sequence(&services, &sequence).await?;

    Ok(())
}
