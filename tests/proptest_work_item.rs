//! Property-based tests for the work-item model (spec §3.1, P4).

use jive_mcp::models::{ItemType, Priority, Status, WorkItem};
use proptest::prelude::*;

fn arb_item_type() -> impl Strategy<Value = ItemType> {
    prop_oneof![
        Just(ItemType::Initiative),
        Just(ItemType::Epic),
        Just(ItemType::Feature),
        Just(ItemType::Story),
        Just(ItemType::Task),
    ]
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::Low), Just(Priority::Medium), Just(Priority::High), Just(Priority::Critical)]
}

fn arb_work_item() -> impl Strategy<Value = WorkItem> {
    (arb_item_type(), "[A-Za-z0-9 ]{1,60}", "[A-Za-z0-9 .,]{0,200}", arb_priority()).prop_map(
        |(item_type, title, description, priority)| {
            let mut item = WorkItem::new(item_type, title, description);
            item.priority = priority;
            item
        },
    )
}

proptest! {
    /// Serializing then deserializing a work item preserves every field
    /// that actually round-trips over the wire (`vector` is never
    /// serialized, spec §6.2).
    #[test]
    fn work_item_roundtrip(item in arb_work_item()) {
        let json = serde_json::to_value(&item).expect("serialize");
        let decoded: WorkItem = serde_json::from_value(json).expect("deserialize");

        prop_assert_eq!(&item.id, &decoded.id);
        prop_assert_eq!(&item.title, &decoded.title);
        prop_assert_eq!(&item.description, &decoded.description);
        prop_assert_eq!(item.item_type, decoded.item_type);
        prop_assert_eq!(item.priority, decoded.priority);
        prop_assert_eq!(item.status, decoded.status);
    }

    /// P4: reaching `completed` always forces progress to 100 and stamps
    /// `completed_at`, for any starting progress value.
    #[test]
    fn apply_status_completed_forces_full_progress(initial_progress in 0.0f64..100.0) {
        let mut item = WorkItem::new(ItemType::Task, "t".to_string(), String::new());
        item.progress_percentage = initial_progress;
        item.apply_status(Status::Completed);

        prop_assert!((item.progress_percentage - 100.0).abs() < f64::EPSILON);
        prop_assert!(item.completed_at.is_some());
    }

    /// `apply_progress` under auto-calculation never produces a status
    /// outside spec §4.5.2's three buckets for the given input range.
    #[test]
    fn apply_progress_auto_calculates_status(progress in 0.0f64..=100.0) {
        let mut item = WorkItem::new(ItemType::Task, "t".to_string(), String::new());
        item.apply_progress(progress, true);

        if progress <= 0.0 {
            prop_assert_eq!(item.status, Status::NotStarted);
        } else if progress >= 100.0 {
            prop_assert_eq!(item.status, Status::Completed);
            prop_assert!(item.completed_at.is_some());
        } else {
            prop_assert_eq!(item.status, Status::InProgress);
        }
    }

    /// `progress_percentage` is always clamped into [0, 100] regardless
    /// of the input, even far outside that range.
    #[test]
    fn apply_progress_always_clamped(progress in -1000.0f64..1000.0) {
        let mut item = WorkItem::new(ItemType::Story, "t".to_string(), String::new());
        item.apply_progress(progress, false);
        prop_assert!(item.progress_percentage >= 0.0);
        prop_assert!(item.progress_percentage <= 100.0);
    }
}

#[test]
fn new_item_has_sane_defaults() {
    let item = WorkItem::new(ItemType::Initiative, "Launch".to_string(), String::new());
    assert_eq!(item.status, Status::NotStarted);
    assert_eq!(item.priority, Priority::Medium);
    assert!(item.tags.is_empty());
    assert!(item.dependencies.is_empty());
    assert_eq!(item.metadata, "{}");
    assert!((item.progress_percentage - 0.0).abs() < f64::EPSILON);
}
