//! Newsroom slot service — binary entrypoint.
//! Boots the Axum HTTP server: config, slot cache, pipeline, cache warmer, metrics.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use newsroom_slots::api::{self, AppState};
use newsroom_slots::config::AppConfig;
use newsroom_slots::metrics::Metrics;
use newsroom_slots::{app, warmer};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    newsroom_slots::init_tracing();

    let cfg = AppConfig::load_default().context("loading newsroom config")?;
    tracing::info!(
        categories = ?cfg.categories,
        slot_hours = ?cfg.schedule.slot_hours,
        always_open = cfg.schedule.always_open,
        "config loaded"
    );

    let pipeline = Arc::new(app::build_pipeline(&cfg)?);

    if cfg.pipeline.warm_interval_secs > 0 {
        warmer::spawn_cache_warmer(
            pipeline.clone(),
            Duration::from_secs(cfg.pipeline.warm_interval_secs),
        );
    }

    let mut router = api::router(AppState::new(pipeline));
    match Metrics::init(cfg.cache.ttl_secs) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "prometheus recorder not installed; /metrics disabled"),
    }

    Ok(router.into())
}
