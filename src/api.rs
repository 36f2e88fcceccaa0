// src/api.rs
//! Thin HTTP surface over the ingestion pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::model::{TimeBlock, TimeSlot};
use crate::pipeline::{IngestionPipeline, ServedFrom};

/// Response header telling whether `/news` was served from cache.
pub const SLOT_CACHE_HEADER: &str = "x-slot-cache";

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    clock: Clock,
}

impl AppState {
    pub fn new(pipeline: Arc<IngestionPipeline>) -> Self {
        Self {
            pipeline,
            clock: Arc::new(Utc::now),
        }
    }

    /// Same state with a fixed or scripted notion of "now".
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/news", get(news))
        .route("/news/today", get(today))
        .route("/slots", get(slots))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsQuery {
    time_slot: Option<String>,
    // kept as text so a malformed flag reads as "false" instead of a 400
    force: Option<String>,
}

#[derive(Serialize)]
struct NewsOk<'a> {
    status: &'static str,
    #[serde(flatten)]
    block: &'a TimeBlock,
}

fn error_response(code: StatusCode, error: impl Into<String>, details: Option<String>) -> Response {
    let mut body = json!({ "status": "error", "error": error.into() });
    if let Some(d) = details {
        body["details"] = d.into();
    }
    (code, Json(body)).into_response()
}

fn parse_flag(v: Option<&str>) -> bool {
    matches!(
        v.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

async fn news(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> Response {
    let Some(raw) = q.time_slot.as_deref().filter(|s| !s.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "timeSlot is required (10AM, 3PM or 8PM)", None);
    };
    let slot: TimeSlot = match raw.parse() {
        Ok(s) => s,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid timeSlot '{raw}', expected 10AM, 3PM or 8PM"),
                None,
            )
        }
    };
    let force = parse_flag(q.force.as_deref());

    let now = state.now();
    let scheduler = state.pipeline.scheduler();
    if !scheduler.is_slot_open(slot, now) {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("time slot {slot} is not available yet"),
            None,
        );
    }

    let date = scheduler.date_key(now);
    match state.pipeline.get_or_refresh_for(&date, slot, now, force).await {
        Ok(served) => {
            let marker = match served.from {
                ServedFrom::Cache => "HIT",
                ServedFrom::Refresh => "MISS",
                ServedFrom::Joined => "JOINED",
            };
            let mut resp = Json(NewsOk {
                status: "success",
                block: &served.block,
            })
            .into_response();
            resp.headers_mut()
                .insert(SLOT_CACHE_HEADER, HeaderValue::from_static(marker));
            resp
        }
        Err(e) => {
            tracing::error!(target: "api", date = %date, slot = %slot, error = %e, "news request failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to load news",
                Some(e.to_string()),
            )
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TodayOut {
    status: &'static str,
    date: String,
    time_blocks: Vec<TimeBlock>,
}

/// All of today's open slots; slots that fail to load are omitted.
async fn today(State(state): State<AppState>) -> Json<TodayOut> {
    let now = state.now();
    let time_blocks = state.pipeline.available_blocks(now).await;
    Json(TodayOut {
        status: "success",
        date: state.pipeline.scheduler().date_key(now),
        time_blocks,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotInfo {
    time: TimeSlot,
    hour: u32,
    open: bool,
    due_for_refresh: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotsOut {
    date: String,
    always_open: bool,
    next: TimeSlot,
    slots: Vec<SlotInfo>,
}

async fn slots(State(state): State<AppState>) -> Json<SlotsOut> {
    let now = state.now();
    let s = state.pipeline.scheduler();
    Json(SlotsOut {
        date: s.date_key(now),
        always_open: s.always_open(),
        next: s.next_slot(now),
        slots: TimeSlot::ALL
            .into_iter()
            .map(|t| SlotInfo {
                time: t,
                hour: s.slot_hour(t),
                open: s.is_slot_open(t, now),
                due_for_refresh: s.is_due_for_refresh(t, now),
            })
            .collect(),
    })
}
