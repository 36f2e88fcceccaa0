// src/scheduler.rs
//! Slot scheduling: pure time-of-day rules for slot availability and refresh.
//!
//! Everything here is a function of `now` plus static configuration. Local
//! time is the newsroom's fixed UTC offset, so results do not depend on the
//! host timezone.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, TimeZone, Timelike, Utc};

use crate::config::ScheduleConfig;
use crate::model::TimeSlot;

#[derive(Debug, Clone)]
pub struct SlotScheduler {
    offset: FixedOffset,
    always_open: bool,
    refresh_window_minutes: u32,
    slot_hours: [u32; 3],
}

impl SlotScheduler {
    pub fn new(cfg: &ScheduleConfig) -> Self {
        let offset = FixedOffset::east_opt(cfg.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| {
                tracing::warn!(
                    utc_offset_minutes = cfg.utc_offset_minutes,
                    "invalid utc offset, falling back to UTC"
                );
                Utc.fix()
            });
        Self {
            offset,
            always_open: cfg.always_open,
            refresh_window_minutes: cfg.refresh_window_minutes,
            slot_hours: cfg.slot_hours,
        }
    }

    /// Same schedule with the development override switched on or off.
    pub fn with_always_open(mut self, on: bool) -> Self {
        self.always_open = on;
        self
    }

    pub fn always_open(&self) -> bool {
        self.always_open
    }

    pub fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.offset)
    }

    /// Local calendar day, `YYYY-MM-DD`. Part of every cache key.
    pub fn date_key(&self, now: DateTime<Utc>) -> String {
        self.local(now).format("%Y-%m-%d").to_string()
    }

    pub fn slot_hour(&self, slot: TimeSlot) -> u32 {
        self.slot_hours[slot.index()]
    }

    /// True once local time-of-day reaches the slot hour (or always, with the override).
    pub fn is_slot_open(&self, slot: TimeSlot, now: DateTime<Utc>) -> bool {
        if self.always_open {
            return true;
        }
        self.local(now).hour() >= self.slot_hour(slot)
    }

    /// True only in the first `refresh_window_minutes` of the slot hour (inclusive).
    pub fn is_due_for_refresh(&self, slot: TimeSlot, now: DateTime<Utc>) -> bool {
        let local = self.local(now);
        local.hour() == self.slot_hour(slot) && local.minute() <= self.refresh_window_minutes
    }

    /// Instant at which `slot` opens on the local day containing `now`.
    pub fn slot_opens_at(&self, slot: TimeSlot, now: DateTime<Utc>) -> DateTime<Utc> {
        let day = self.local(now).date_naive();
        let opening = NaiveTime::from_hms_opt(self.slot_hour(slot), 0, 0).unwrap_or(NaiveTime::MIN);
        self.offset
            .from_local_datetime(&day.and_time(opening))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now)
    }

    pub fn open_slots(&self, now: DateTime<Utc>) -> Vec<TimeSlot> {
        TimeSlot::ALL
            .into_iter()
            .filter(|s| self.is_slot_open(*s, now))
            .collect()
    }

    /// Next slot to open; after the last slot of the day wraps to tomorrow's first.
    pub fn next_slot(&self, now: DateTime<Utc>) -> TimeSlot {
        let hour = self.local(now).hour();
        TimeSlot::ALL
            .into_iter()
            .find(|s| hour < self.slot_hour(*s))
            .unwrap_or(TimeSlot::ALL[0])
    }
}
