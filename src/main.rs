//! Tagcache sweeper
//!
//! Runs caller-driven clean passes against the cache collection. Once by
//! default, or every `SWEEP_INTERVAL_SECS` until interrupted.

use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tagcache::{CacheBackend, Config, DocumentStore, MongoStore};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tagcache=info,mongodb=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting tagcache sweeper...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");
    info!(
        "Clean mode: {} {:?}, interval: {:?}",
        config.clean_mode, config.clean_tags, config.sweep_interval
    );

    info!("Connecting to MongoDB...");
    let store =
        MongoStore::connect(&config.mongodb_uri, &config.mongodb_database, &config.collection)
            .await?;
    store.ensure_indexes().await?;

    let cache = CacheBackend::from_config(store, &config);

    let Some(period) = config.sweep_interval else {
        sweep(&cache, &config).await?;
        return Ok(());
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Keep sweeping; the next pass retries whatever this one missed.
                if let Err(e) = sweep(&cache, &config).await {
                    error!("Clean pass failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down sweeper");
                break;
            }
        }
    }

    Ok(())
}

async fn sweep<S: DocumentStore>(cache: &CacheBackend<S>, config: &Config) -> anyhow::Result<()> {
    let report = cache
        .clean(config.clean_mode, config.clean_tags.iter().cloned())
        .await?;
    info!("Clean {} removed {} entries", report.mode, report.removed);
    Ok(())
}
