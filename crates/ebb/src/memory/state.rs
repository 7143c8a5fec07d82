//! Per-session memory state
//!
//! `SessionMemoryState` is the unit of persistence: one document holding
//! every slot, the pool and the logical clock. Callers load it, mutate it
//! through the methods here and save it back as a whole.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::memory::policy::{CategoryBehavior, MemoryPolicy};
use crate::memory::pool::PoolCollection;
use crate::memory::slots::SlotCollection;
use crate::memory::types::{Category, MemoryItem, bound_content};
use crate::session::SessionId;

/// Outcome of recording one fact
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    /// The stored copy of the fact
    pub item: MemoryItem,
    /// True if an existing item with identical content was refreshed
    pub merged: bool,
    /// False if the fact was evicted on the same operation
    pub retained: bool,
    /// Items evicted by this operation
    pub evicted: Vec<MemoryItem>,
    /// Set when the content had to be truncated
    pub warning: Option<String>,
}

/// Full working memory of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMemoryState {
    pub session_id: SessionId,
    pub slots: BTreeMap<Category, SlotCollection>,
    pub pool: PoolCollection,
    /// Logical clock; advanced once per pool ingest
    pub event_counter: u64,
    pub updated_at: DateTime<Utc>,
}

impl SessionMemoryState {
    /// Fresh, empty state with one empty collection per slot category
    pub fn new(session_id: SessionId, policy: &MemoryPolicy) -> Self {
        let slots = policy
            .slot_categories()
            .map(|(category, _)| (category, SlotCollection::new()))
            .collect();
        Self {
            session_id,
            slots,
            pool: PoolCollection::new(),
            event_counter: 0,
            updated_at: Utc::now(),
        }
    }

    /// Record one fact, routing it by its category's behavior.
    pub fn record(
        &mut self,
        category: Category,
        content: &str,
        source: &str,
        policy: &MemoryPolicy,
    ) -> RecordOutcome {
        let (content, warning) = bound_content(content, policy.max_content_chars());
        let item = MemoryItem::new(category, content, source);

        let outcome = match policy.behavior(category) {
            CategoryBehavior::Slot(behavior) => {
                let update = self
                    .slots
                    .entry(category)
                    .or_default()
                    .add_or_refresh(item, &behavior);
                let retained = !update.evicted.iter().any(|e| e.id == update.item.id);
                RecordOutcome {
                    item: update.item,
                    merged: update.merged,
                    retained,
                    evicted: update.evicted,
                    warning,
                }
            }
            CategoryBehavior::Pool => {
                self.event_counter += 1;
                let update = self.pool.ingest(item, self.event_counter, policy.pool());
                RecordOutcome {
                    item: update.item,
                    merged: update.merged,
                    retained: update.retained,
                    evicted: update.evicted,
                    warning,
                }
            }
        };

        self.updated_at = Utc::now();
        outcome
    }

    /// Remove every item of one category; returns the count removed
    pub fn clear_category(&mut self, category: Category, policy: &MemoryPolicy) -> usize {
        let removed = match policy.behavior(category) {
            CategoryBehavior::Slot(_) => self.slots.get_mut(&category).map_or(0, |s| s.clear()),
            CategoryBehavior::Pool => self.pool.remove_category(category),
        };
        if removed > 0 {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Remove the first item containing `needle`, scanning slot categories
    /// in priority order and then the pool.
    pub fn remove_by_content_match(&mut self, needle: &str) -> Result<MemoryItem, LookupError> {
        let found = self
            .slots
            .values_mut()
            .find_map(|slot| slot.remove_matching(needle))
            .or_else(|| self.pool.remove_matching(needle));

        match found {
            Some(item) => {
                self.updated_at = Utc::now();
                Ok(item)
            }
            None => Err(LookupError::NotFound(needle.to_string())),
        }
    }

    /// Items currently held for a category
    pub fn items(&self, category: Category) -> Vec<&MemoryItem> {
        match self.slots.get(&category) {
            Some(slot) => slot.items().iter().collect(),
            None => self
                .pool
                .items()
                .iter()
                .filter(|m| m.category == category)
                .collect(),
        }
    }

    /// Total items across slots and pool
    pub fn len(&self) -> usize {
        self.slots.values().map(|s| s.len()).sum::<usize>() + self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> (SessionMemoryState, MemoryPolicy) {
        let policy = MemoryPolicy::default();
        let id = SessionId::try_from("state-test").unwrap();
        (SessionMemoryState::new(id, &policy), policy)
    }

    #[test]
    fn test_new_state_has_every_slot() {
        let (state, _) = state();
        assert_eq!(state.slots.len(), 3);
        assert!(state.is_empty());
        assert_eq!(state.event_counter, 0);
    }

    #[test]
    fn test_slot_record_does_not_tick_clock() {
        let (mut state, policy) = state();
        state.record(Category::Decision, "use sqlite", "assistant", &policy);
        assert_eq!(state.event_counter, 0);
        assert_eq!(state.items(Category::Decision).len(), 1);
        assert!(state.pool.is_empty());
    }

    #[test]
    fn test_pool_record_ticks_clock() {
        let (mut state, policy) = state();
        state.record(Category::FilePath, "src/lib.rs", "read", &policy);
        state.record(Category::Discovery, "uses tokio", "read", &policy);
        assert_eq!(state.event_counter, 2);
        assert_eq!(state.pool.len(), 2);
        assert_eq!(state.items(Category::FilePath).len(), 1);
    }

    #[test]
    fn test_oversized_content_is_truncated_with_warning() {
        let (mut state, policy) = state();
        let outcome = state.record(Category::Task, &"x".repeat(300), "manual", &policy);
        assert_eq!(outcome.item.content.len(), 200);
        assert!(outcome.warning.is_some());
    }

    #[test]
    fn test_clear_category() {
        let (mut state, policy) = state();
        state.record(Category::Error, "e1", "bash", &policy);
        state.record(Category::Error, "e2", "bash", &policy);
        state.record(Category::FilePath, "a.rs", "read", &policy);

        assert_eq!(state.clear_category(Category::Error, &policy), 2);
        assert_eq!(state.clear_category(Category::FilePath, &policy), 1);
        assert_eq!(state.clear_category(Category::Task, &policy), 0);
        assert!(state.is_empty());
    }

    #[test]
    fn test_remove_prefers_slots_over_pool() {
        let (mut state, policy) = state();
        state.record(Category::Discovery, "shared needle in pool", "read", &policy);
        state.record(Category::Error, "shared needle in slot", "bash", &policy);

        let removed = state.remove_by_content_match("shared needle").unwrap();
        assert_eq!(removed.category, Category::Error);
        let removed = state.remove_by_content_match("shared needle").unwrap();
        assert_eq!(removed.category, Category::Discovery);
    }

    #[test]
    fn test_remove_reports_not_found() {
        let (mut state, _) = state();
        assert_eq!(
            state.remove_by_content_match("missing"),
            Err(LookupError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_slot_priority_order() {
        let (mut state, policy) = state();
        state.record(Category::Task, "needle task", "manual", &policy);
        state.record(Category::Decision, "needle decision", "assistant", &policy);

        let removed = state.remove_by_content_match("needle").unwrap();
        assert_eq!(removed.category, Category::Decision);
    }
}
