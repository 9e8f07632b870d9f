//! RBS ingest service: binary entrypoint.
//! Boots the Axum HTTP server, the metrics exporter and the sheet sync scheduler.

use rbs_ingest::{
    api::{self, AppState},
    ingest::{
        config::load_config_default,
        scheduler::{spawn_sync_scheduler, SyncSchedulerCfg},
    },
    metrics::Metrics,
};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `LOG_FORMAT=json` switches to JSON lines; filter comes from `RUST_LOG`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rbs_ingest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    // Shuttle may already have installed a subscriber.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = load_config_default()?;
    tracing::info!(
        sources = config.sync_sources.len(),
        known_providers = config.known_providers.len(),
        scheduler = config.scheduler.enabled,
        "ingest config loaded"
    );

    let metrics = Metrics::init()?;
    let state = AppState::from_config(config.clone());

    if config.scheduler.enabled {
        spawn_sync_scheduler(
            SyncSchedulerCfg {
                interval_secs: config.scheduler.interval_secs,
            },
            state.sync.clone(),
        );
    }

    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
