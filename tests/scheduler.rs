// tests/scheduler.rs
//
// Time-of-day rules: availability, refresh window, next slot, local offset.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{at, scheduler};
use newsroom_slots::config::ScheduleConfig;
use newsroom_slots::model::TimeSlot;
use newsroom_slots::scheduler::SlotScheduler;

#[test]
fn afternoon_slot_is_closed_at_14_and_open_at_15() {
    let s = scheduler(false);
    assert!(!s.is_slot_open(TimeSlot::Afternoon, at(14, 0)));
    assert!(!s.is_slot_open(TimeSlot::Afternoon, at(14, 59)));
    assert!(s.is_slot_open(TimeSlot::Afternoon, at(15, 0)));
}

#[test]
fn availability_is_monotonic_over_the_day() {
    let s = scheduler(false);
    for slot in TimeSlot::ALL {
        let mut was_open = false;
        let mut t = at(0, 0);
        while t < at(23, 59) {
            let open = s.is_slot_open(slot, t);
            assert!(!(was_open && !open), "{slot} closed again at {t}");
            was_open = open;
            t += Duration::minutes(7);
        }
        assert!(was_open, "{slot} never opened");
    }
}

#[test]
fn override_opens_every_slot() {
    let s = scheduler(true);
    for slot in TimeSlot::ALL {
        assert!(s.is_slot_open(slot, at(0, 30)));
    }
    assert_eq!(s.open_slots(at(0, 30)), TimeSlot::ALL.to_vec());
}

#[test]
fn refresh_window_includes_minute_five_only() {
    let s = scheduler(false);
    assert!(s.is_due_for_refresh(TimeSlot::Morning, at(10, 0)));
    assert!(s.is_due_for_refresh(TimeSlot::Morning, at(10, 5)));
    assert!(!s.is_due_for_refresh(TimeSlot::Morning, at(10, 6)));
    assert!(!s.is_due_for_refresh(TimeSlot::Morning, at(9, 59)));
    // override does not make a slot due
    assert!(!scheduler(true).is_due_for_refresh(TimeSlot::Evening, at(10, 0)));
}

#[test]
fn open_slots_and_next_slot_follow_the_clock() {
    let s = scheduler(false);
    assert!(s.open_slots(at(9, 0)).is_empty());
    assert_eq!(s.next_slot(at(9, 0)), TimeSlot::Morning);
    assert_eq!(s.open_slots(at(16, 0)), vec![TimeSlot::Morning, TimeSlot::Afternoon]);
    assert_eq!(s.next_slot(at(16, 0)), TimeSlot::Evening);
    // after the last slot wraps to tomorrow's first
    assert_eq!(s.next_slot(at(21, 0)), TimeSlot::Morning);
}

#[test]
fn local_offset_moves_date_and_opening() {
    let cfg = ScheduleConfig {
        utc_offset_minutes: 120,
        ..ScheduleConfig::default()
    };
    let s = SlotScheduler::new(&cfg);

    // 08:30 UTC is 10:30 local
    assert!(s.is_slot_open(TimeSlot::Morning, at(8, 30)));
    assert_eq!(s.slot_opens_at(TimeSlot::Morning, at(8, 30)), at(8, 0));

    // 23:00 UTC on Jan 1 is already Jan 2 locally
    let late = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
    assert_eq!(s.date_key(late), "2024-01-02");
}

#[test]
fn custom_slot_hours_are_respected() {
    let cfg = ScheduleConfig {
        slot_hours: [7, 12, 18],
        ..ScheduleConfig::default()
    };
    let s = SlotScheduler::new(&cfg);
    assert_eq!(s.slot_hour(TimeSlot::Afternoon), 12);
    assert!(s.is_slot_open(TimeSlot::Morning, at(7, 0)));
    assert!(s.is_due_for_refresh(TimeSlot::Evening, at(18, 3)));
}
