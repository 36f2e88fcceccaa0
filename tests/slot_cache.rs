// tests/slot_cache.rs
//
// Two-tier slot cache behaviour: round-trip, TTL, day rollover, tier
// failures, backfill and idempotent invalidation.

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{at, block, BrokenTier};
use newsroom_slots::cache::{
    file::FileTier, memory::MemoryTier, slot_key, CacheEntry, CacheTier, SlotCache,
};
use newsroom_slots::model::TimeSlot;

const DAY: u64 = 86_400;

fn file_backed(dir: &std::path::Path) -> (SlotCache, Arc<MemoryTier>, Arc<FileTier>) {
    let fast = Arc::new(MemoryTier::new(16, DAY));
    let durable = Arc::new(FileTier::new(dir));
    (SlotCache::new(fast.clone(), durable.clone(), DAY), fast, durable)
}

#[tokio::test]
async fn set_then_get_round_trips_before_ttl() {
    let tmp = tempfile::tempdir().unwrap();
    let (cache, _, _) = file_backed(tmp.path());
    let b = block("2024-01-01", TimeSlot::Morning);

    cache.set_at("2024-01-01", TimeSlot::Morning, &b, at(10, 0)).await.unwrap();

    let got = cache.get_at("2024-01-01", TimeSlot::Morning, at(18, 0)).await;
    assert_eq!(got, Some(b));
    // other slot of the same day is untouched
    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Evening, at(18, 0)).await, None);
}

#[tokio::test]
async fn entries_expire_after_ttl_and_are_evicted() {
    let tmp = tempfile::tempdir().unwrap();
    let (cache, _, durable) = file_backed(tmp.path());
    let b = block("2024-01-01", TimeSlot::Morning);
    cache.set_at("2024-01-01", TimeSlot::Morning, &b, at(10, 0)).await.unwrap();

    let later = at(10, 0) + Duration::seconds(DAY as i64);
    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Morning, later).await, None);

    // lazy eviction removed the durable file too
    let key = slot_key("2024-01-01", TimeSlot::Morning);
    assert!(durable.read(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn yesterdays_block_is_not_served_under_todays_key() {
    let tmp = tempfile::tempdir().unwrap();
    let (cache, fast, durable) = file_backed(tmp.path());

    // a payload dated yesterday sitting under today's key
    let stale = block("2023-12-31", TimeSlot::Morning);
    let key = slot_key("2024-01-01", TimeSlot::Morning);
    let entry = CacheEntry {
        key: key.clone(),
        payload: serde_json::to_string(&stale).unwrap(),
        written_at: at(9, 0),
        ttl_seconds: DAY,
    };
    fast.write(&entry).await.unwrap();
    durable.write(&entry).await.unwrap();

    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Morning, at(10, 0)).await, None);
    assert!(durable.read(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn durable_hit_backfills_fast_tier() {
    let tmp = tempfile::tempdir().unwrap();
    let b = block("2024-01-01", TimeSlot::Afternoon);
    {
        let (writer, _, _) = file_backed(tmp.path());
        writer.set_at("2024-01-01", TimeSlot::Afternoon, &b, at(15, 0)).await.unwrap();
    }

    // fresh process: empty fast tier, same directory
    let (cache, fast, _) = file_backed(tmp.path());
    let hit = cache
        .lookup("2024-01-01", TimeSlot::Afternoon, at(15, 30))
        .await
        .expect("durable hit");
    assert_eq!(hit.tier, "file");
    assert_eq!(hit.written_at, at(15, 0));

    let key = slot_key("2024-01-01", TimeSlot::Afternoon);
    let backfilled = fast.read(&key).await.unwrap().expect("backfilled");
    assert_eq!(backfilled.written_at, at(15, 0));

    let again = cache.lookup("2024-01-01", TimeSlot::Afternoon, at(15, 31)).await.unwrap();
    assert_eq!(again.tier, "memory");
}

#[tokio::test]
async fn broken_fast_tier_falls_back_to_durable() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = SlotCache::new(Arc::new(BrokenTier), Arc::new(FileTier::new(tmp.path())), DAY);
    let b = block("2024-01-01", TimeSlot::Evening);

    cache.set_at("2024-01-01", TimeSlot::Evening, &b, at(20, 0)).await.unwrap();
    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Evening, at(20, 1)).await, Some(b));
}

#[tokio::test]
async fn broken_durable_tier_is_tolerated() {
    let cache = SlotCache::new(Arc::new(MemoryTier::new(16, DAY)), Arc::new(BrokenTier), DAY);
    let b = block("2024-01-01", TimeSlot::Morning);

    cache.set_at("2024-01-01", TimeSlot::Morning, &b, at(10, 0)).await.unwrap();
    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Morning, at(10, 1)).await, Some(b));
}

#[tokio::test]
async fn write_fails_only_when_both_tiers_fail() {
    let cache = SlotCache::new(Arc::new(BrokenTier), Arc::new(BrokenTier), DAY);
    let b = block("2024-01-01", TimeSlot::Morning);
    assert!(cache.set_at("2024-01-01", TimeSlot::Morning, &b, at(10, 0)).await.is_err());
    // reads still degrade to a miss
    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Morning, at(10, 0)).await, None);
}

#[tokio::test]
async fn invalidate_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let (cache, _, _) = file_backed(tmp.path());
    let b = block("2024-01-01", TimeSlot::Morning);
    cache.set_at("2024-01-01", TimeSlot::Morning, &b, at(10, 0)).await.unwrap();

    cache.invalidate("2024-01-01", TimeSlot::Morning).await;
    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Morning, at(10, 1)).await, None);

    // second call on a missing key is a no-op
    cache.invalidate("2024-01-01", TimeSlot::Morning).await;
    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Morning, at(10, 2)).await, None);
}

#[tokio::test]
async fn corrupt_payload_reads_as_miss() {
    let fast = Arc::new(MemoryTier::new(16, DAY));
    let cache = SlotCache::new(fast.clone(), Arc::new(MemoryTier::new(16, DAY)), DAY);
    let key = slot_key("2024-01-01", TimeSlot::Morning);
    fast.write(&CacheEntry {
        key: key.clone(),
        payload: "{not json".into(),
        written_at: at(10, 0),
        ttl_seconds: DAY,
    })
    .await
    .unwrap();

    assert_eq!(cache.get_at("2024-01-01", TimeSlot::Morning, at(10, 1)).await, None);
    assert!(fast.read(&key).await.unwrap().is_none());
}
