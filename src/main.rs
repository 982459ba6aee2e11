use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use birdnet_datastore::{
    config::Config,
    database::{Database, repositories::SpeciesSeaOrmRepository},
    errors::{AppError, AppResult},
    species::SpeciesCache,
};

#[derive(Parser)]
#[command(name = "birdnet-datastore")]
#[command(version)]
#[command(about = "Prepare the BirdNET detection datastore and warm its species cache")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("birdnet_datastore={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting BirdNET datastore v{}", env!("CARGO_PKG_VERSION"));

    run(cli).await?;
    Ok(())
}

async fn run(cli: Cli) -> AppResult<()> {
    if cli.init_config {
        return Config::write_default(&cli.config)
            .map_err(|e| AppError::configuration(format!("{e:#}")));
    }

    let mut config = Config::load_from_file(&cli.config)
        .map_err(|e| AppError::configuration(format!("{e:#}")))?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    info!("Using database: {}", config.database.url);

    let database = Database::new(&config.database)
        .await
        .map_err(|e| AppError::internal(format!("Database connection failed: {e:#}")))?;
    database
        .migrate()
        .await
        .map_err(|e| AppError::internal(format!("Database migration failed: {e:#}")))?;
    info!("Database connection established and migrations applied");

    let repository = Arc::new(SpeciesSeaOrmRepository::new(database.connection()));
    let cache = SpeciesCache::from_config(repository, &config.species_cache);

    let ctx = CancellationToken::new();
    let shutdown = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding database work");
            shutdown.cancel();
        }
    });

    if config.species_cache.warm_on_startup && cache.is_expired().await {
        cache.refresh(&ctx).await?;
    }

    let stats = cache.stats().await;
    info!(
        "Species cache ready: {} species ({} by name, {} by eBird code), ttl {}",
        stats.size,
        stats.by_scientific_name_count,
        stats.by_ebird_code_count,
        humantime::format_duration(stats.ttl)
    );
    debug!(
        "Species cache stats: {}",
        serde_json::to_string(&stats).map_err(|e| AppError::internal(e.to_string()))?
    );
    info!("Station '{}' ready", config.station.node_name);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_config_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[species_cache]\nttl = \"not a duration\"\n").unwrap();

        let cli = Cli::parse_from(["birdnet-datastore", "--config", path.to_str().unwrap()]);
        let err = run(cli).await.unwrap_err();

        assert!(matches!(err, AppError::Configuration { .. }), "got {err}");
    }

    #[tokio::test]
    async fn test_init_config_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cli = Cli::parse_from([
            "birdnet-datastore",
            "--init-config",
            "--config",
            path.to_str().unwrap(),
        ]);
        run(cli).await.unwrap();

        let written = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(written.species_cache.refresh_limit, 50_000);
    }
}
