//! Run one slot refresh with the configured stack and print the block as JSON.
//!
//! Usage: `refresh_once <10AM|3PM|8PM> [--force]`

use anyhow::{bail, Context, Result};
use chrono::Utc;

use newsroom_slots::config::AppConfig;
use newsroom_slots::{app, TimeSlot};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    newsroom_slots::init_tracing();

    let mut slot = None;
    let mut force = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--force" | "-f" => force = true,
            other => slot = Some(other.parse::<TimeSlot>().with_context(|| format!("bad slot `{other}`"))?),
        }
    }
    let Some(slot) = slot else {
        bail!("usage: refresh_once <10AM|3PM|8PM> [--force]");
    };

    let cfg = AppConfig::load_default()?;
    let pipeline = app::build_pipeline(&cfg)?;
    let now = Utc::now();
    let date = pipeline.scheduler().date_key(now);

    let served = pipeline.get_or_refresh_for(&date, slot, now, force).await?;
    eprintln!(
        "{} {}: {} stories ({:?})",
        served.block.date,
        served.block.time,
        served.block.stories.len(),
        served.from
    );
    println!("{}", serde_json::to_string_pretty(&served.block)?);
    Ok(())
}
