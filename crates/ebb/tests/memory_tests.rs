//! Integration tests for slot and pool retention
//!
//! Exercises the decay law, the eviction floor, content dedup and slot
//! capacity through the public memory API.

use ebb::memory::pool::decay;
use ebb::memory::{
    Category, MemoryItem, MemoryPolicy, PoolBehavior, PoolCollection, SessionMemoryState,
    SlotBehavior, SlotCollection,
};
use ebb::session::SessionId;

const EPSILON: f64 = 1e-12;

fn sid(s: &str) -> SessionId {
    SessionId::try_from(s).unwrap()
}

fn pool_item(content: &str) -> MemoryItem {
    MemoryItem::new(Category::Discovery, content, "test")
}

/// Ingest `content` followed by `others` distinct fillers, one tick each
fn pool_with_fillers(content: &str, others: u64) -> PoolCollection {
    let behavior = PoolBehavior::default();
    let mut pool = PoolCollection::new();
    pool.ingest(pool_item(content), 1, &behavior);
    for tick in 0..others {
        pool.ingest(pool_item(&format!("filler {tick}")), tick + 2, &behavior);
    }
    pool
}

mod decay_tests {
    use super::*;

    #[test]
    fn test_unmentioned_score_follows_decay_law() {
        let behavior = PoolBehavior::default();
        for n in [1u64, 5, 10, 20] {
            let pool = pool_with_fillers("watched", n);
            let score = pool.get("watched").and_then(|m| m.score).unwrap();
            let expected = behavior.initial_score * behavior.decay_rate.powi(n as i32);
            assert!(
                (score - expected).abs() < EPSILON,
                "after {n} ticks: {score} != {expected}"
            );
        }
    }

    #[test]
    fn test_decay_helper_matches_repeated_ticks() {
        let stepwise = (0..7).fold(1.0, |s, _| decay(s, 0.85, 1));
        assert!((decay(1.0, 0.85, 7) - stepwise).abs() < EPSILON);
        assert_eq!(decay(0.42, 0.85, 0), 0.42);
    }

    #[test]
    fn test_member_evicted_by_twenty_ninth_tick() {
        assert_eq!(PoolBehavior::default().survival_events(), 28);

        let survived = pool_with_fillers("fading", 28);
        assert!(survived.get("fading").is_some());

        let evicted = pool_with_fillers("fading", 29);
        assert!(evicted.get("fading").is_none());
    }

    #[test]
    fn test_only_mentioned_item_is_boosted() {
        let behavior = PoolBehavior::default();
        let mut pool = PoolCollection::new();
        pool.ingest(pool_item("a"), 1, &behavior);
        pool.ingest(pool_item("b"), 2, &behavior);
        pool.ingest(pool_item("a"), 3, &behavior);

        let a = pool.get("a").and_then(|m| m.score).unwrap();
        let b = pool.get("b").and_then(|m| m.score).unwrap();
        assert!((a - (0.85f64.powi(2) + 0.5)).abs() < EPSILON);
        assert!((b - 0.85).abs() < EPSILON);
    }
}

mod dedup_tests {
    use super::*;

    #[test]
    fn test_repeated_content_is_unique_with_rising_mentions() {
        let policy = MemoryPolicy::default();
        let mut state = SessionMemoryState::new(sid("dedup"), &policy);

        let mut last = 0;
        for _ in 0..6 {
            let outcome = state.record(Category::FilePath, "src/main.rs", "read", &policy);
            assert!(outcome.item.mentions > last);
            last = outcome.item.mentions;
        }

        let matches = state
            .pool
            .items()
            .iter()
            .filter(|m| m.content == "src/main.rs")
            .count();
        assert_eq!(matches, 1);
        assert_eq!(last, 6);
        assert_eq!(state.event_counter, 6);
    }

    #[test]
    fn test_pool_is_ordered_by_score() {
        let policy = MemoryPolicy::default();
        let mut state = SessionMemoryState::new(sid("order"), &policy);
        for content in ["x", "y", "z", "x", "y", "x"] {
            state.record(Category::Discovery, content, "test", &policy);
        }
        let scores: Vec<f64> = state.pool.items().iter().filter_map(|m| m.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(state.pool.items()[0].content, "x");
    }
}

mod slot_tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_slot_never_exceeds_capacity_and_drops_oldest() {
        let behavior = SlotBehavior { capacity: 3 };
        let mut slot = SlotCollection::new();
        let base = Utc::now();

        for i in 0..3 {
            let mut item = MemoryItem::new(Category::Task, format!("task {i}"), "test");
            item.created_at = base + Duration::seconds(i);
            slot.add_or_refresh(item, &behavior);
        }

        let mut newest = MemoryItem::new(Category::Task, "task 3", "test");
        newest.created_at = base + Duration::seconds(10);
        let update = slot.add_or_refresh(newest, &behavior);

        assert_eq!(slot.len(), 3);
        assert_eq!(update.evicted.len(), 1);
        assert_eq!(update.evicted[0].content, "task 0");
        assert_eq!(slot.items()[0].content, "task 3");
    }

    #[test]
    fn test_slot_records_do_not_tick_the_clock() {
        let policy = MemoryPolicy::default();
        let mut state = SessionMemoryState::new(sid("slots"), &policy);
        for i in 0..20 {
            state.record(Category::Error, &format!("error {i}"), "bash", &policy);
        }
        assert_eq!(state.items(Category::Error).len(), 5);
        assert_eq!(state.event_counter, 0);
    }

    #[test]
    fn test_overlong_content_is_truncated_with_warning() {
        let policy = MemoryPolicy::default();
        let mut state = SessionMemoryState::new(sid("long"), &policy);
        let outcome = state.record(Category::Decision, &"é".repeat(500), "assistant", &policy);

        assert_eq!(outcome.item.content.chars().count(), policy.max_content_chars());
        assert!(outcome.warning.is_some());
    }
}

mod removal_tests {
    use super::*;
    use ebb::LookupError;

    #[test]
    fn test_remove_scans_slots_before_pool() {
        let policy = MemoryPolicy::default();
        let mut state = SessionMemoryState::new(sid("remove"), &policy);
        state.record(Category::Discovery, "shared needle in pool", "read", &policy);
        state.record(Category::Decision, "shared needle in slot", "assistant", &policy);

        let first = state.remove_by_content_match("needle").unwrap();
        assert_eq!(first.category, Category::Decision);
        let second = state.remove_by_content_match("needle").unwrap();
        assert_eq!(second.category, Category::Discovery);
        assert_eq!(
            state.remove_by_content_match("needle"),
            Err(LookupError::NotFound("needle".to_string()))
        );
    }

    #[test]
    fn test_clear_category_counts_removed() {
        let policy = MemoryPolicy::default();
        let mut state = SessionMemoryState::new(sid("clear"), &policy);
        state.record(Category::FilePath, "a.rs", "read", &policy);
        state.record(Category::FilePath, "b.rs", "read", &policy);
        state.record(Category::Discovery, "keep me", "read", &policy);

        assert_eq!(state.clear_category(Category::FilePath, &policy), 2);
        assert_eq!(state.clear_category(Category::FilePath, &policy), 0);
        assert_eq!(state.len(), 1);
    }
}
