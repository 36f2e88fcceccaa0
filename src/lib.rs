// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod app;
pub mod cache;
pub mod classify;
pub mod config;
pub mod editorial;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod scheduler;
pub mod warmer;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::cache::SlotCache;
pub use crate::model::{Category, Story, TimeBlock, TimeSlot};
pub use crate::pipeline::{IngestionPipeline, PipelineError};
pub use crate::scheduler::SlotScheduler;

/// Initialise the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` (default `info` with HTTP client crates at `warn`); set
/// `NEWSROOM_LOG_JSON=1` for JSON lines instead of the compact format.
/// Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,h2=warn,reqwest=warn,rustls=warn"));
    let json = std::env::var("NEWSROOM_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
