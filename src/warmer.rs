// src/warmer.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::model::TimeSlot;
use crate::pipeline::{IngestionPipeline, ServedFrom};

/// Refresh every slot currently inside its refresh window so the first reader
/// after opening gets a warm cache. Returns how many slots were refreshed.
pub async fn warm_once(pipeline: &IngestionPipeline, now: DateTime<Utc>) -> usize {
    let scheduler = pipeline.scheduler();
    let date = scheduler.date_key(now);
    let mut refreshed = 0;

    for slot in TimeSlot::ALL {
        if !scheduler.is_due_for_refresh(slot, now) {
            continue;
        }
        match pipeline.get_or_refresh_for(&date, slot, now, false).await {
            Ok(served) if served.from != ServedFrom::Cache => {
                refreshed += 1;
                tracing::info!(
                    target: "warmer",
                    date = %date,
                    slot = %slot,
                    stories = served.block.stories.len(),
                    "slot warmed"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(target: "warmer", date = %date, slot = %slot, error = %e, "warm refresh failed");
            }
        }
    }

    counter!("warmer_ticks_total").increment(1);
    gauge!("warmer_last_tick_ts").set(now.timestamp() as f64);
    refreshed
}

/// Spawn the background warmer ticking every `interval`.
pub fn spawn_cache_warmer(pipeline: Arc<IngestionPipeline>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            warm_once(&pipeline, Utc::now()).await;
        }
    })
}
