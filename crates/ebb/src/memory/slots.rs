//! FIFO slot collections
//!
//! A slot keeps the most recent facts of one category. Items are stored
//! newest-first; when the collection overflows, the item with the oldest
//! `created_at` is dropped.

use serde::{Deserialize, Serialize};

use crate::memory::policy::SlotBehavior;
use crate::memory::types::MemoryItem;

/// Result of adding an item to a slot
#[derive(Debug, Clone)]
pub struct SlotUpdate {
    /// The stored copy of the item after the update
    pub item: MemoryItem,
    /// True if an item with the same content was refreshed instead
    pub merged: bool,
    /// Items dropped to get back under capacity
    pub evicted: Vec<MemoryItem>,
}

/// Ordered items of one slot category, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotCollection {
    items: Vec<MemoryItem>,
}

impl SlotCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item`, or refresh the existing item with identical content.
    ///
    /// A refresh increments `mentions` and moves `created_at` forward; it
    /// never creates a duplicate.
    pub fn add_or_refresh(&mut self, item: MemoryItem, behavior: &SlotBehavior) -> SlotUpdate {
        let merged = match self.items.iter_mut().find(|i| i.content == item.content) {
            Some(existing) => {
                existing.mentions = existing.mentions.saturating_add(1);
                existing.created_at = item.created_at;
                existing.source = item.source.clone();
                true
            }
            None => {
                self.items.insert(0, item.clone());
                false
            }
        };

        // Stable sort keeps the just-inserted item ahead of equal timestamps
        self.items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let capacity = behavior.capacity.max(1);
        let evicted = if self.items.len() > capacity {
            self.items.split_off(capacity)
        } else {
            Vec::new()
        };

        let stored = self
            .items
            .iter()
            .find(|i| i.content == item.content)
            .cloned()
            .unwrap_or(item);

        SlotUpdate {
            item: stored,
            merged,
            evicted,
        }
    }

    /// Remove every item; returns how many were removed
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    /// Remove the first item whose content contains `needle`
    pub fn remove_matching(&mut self, needle: &str) -> Option<MemoryItem> {
        let index = self.items.iter().position(|i| i.content.contains(needle))?;
        Some(self.items.remove(index))
    }

    pub fn items(&self) -> &[MemoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Category;
    use chrono::{Duration, Utc};

    fn item_at(content: &str, seconds_ago: i64) -> MemoryItem {
        let mut item = MemoryItem::new(Category::Error, content, "bash");
        item.created_at = Utc::now() - Duration::seconds(seconds_ago);
        item
    }

    #[test]
    fn test_insert_orders_newest_first() {
        let mut slot = SlotCollection::new();
        let cap = SlotBehavior { capacity: 5 };
        slot.add_or_refresh(item_at("old", 30), &cap);
        slot.add_or_refresh(item_at("new", 0), &cap);
        slot.add_or_refresh(item_at("mid", 10), &cap);

        let contents: Vec<&str> = slot.items().iter().map(|i| i.content.as_str()).collect();
        assert_eq!(contents, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_duplicate_content_refreshes() {
        let mut slot = SlotCollection::new();
        let cap = SlotBehavior { capacity: 5 };
        let first = slot.add_or_refresh(item_at("same", 60), &cap);
        let second = slot.add_or_refresh(item_at("same", 0), &cap);

        assert!(!first.merged);
        assert!(second.merged);
        assert_eq!(slot.len(), 1);
        assert_eq!(second.item.mentions, 2);
        assert_eq!(second.item.id, first.item.id);
        assert!(second.item.created_at > first.item.created_at);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut slot = SlotCollection::new();
        let cap = SlotBehavior { capacity: 2 };
        slot.add_or_refresh(item_at("b", 20), &cap);
        slot.add_or_refresh(item_at("a", 30), &cap);
        let update = slot.add_or_refresh(item_at("c", 0), &cap);

        assert_eq!(slot.len(), 2);
        assert_eq!(update.evicted.len(), 1);
        assert_eq!(update.evicted[0].content, "a");
        assert!(slot.items().iter().any(|i| i.content == "c"));
    }

    #[test]
    fn test_refresh_rescues_item_from_eviction() {
        let mut slot = SlotCollection::new();
        let cap = SlotBehavior { capacity: 2 };
        slot.add_or_refresh(item_at("a", 30), &cap);
        slot.add_or_refresh(item_at("b", 20), &cap);
        // "a" becomes newest again, so "b" is the one to go
        slot.add_or_refresh(item_at("a", 5), &cap);
        let update = slot.add_or_refresh(item_at("c", 0), &cap);

        assert_eq!(update.evicted[0].content, "b");
    }

    #[test]
    fn test_clear_and_remove() {
        let mut slot = SlotCollection::new();
        let cap = SlotBehavior { capacity: 5 };
        slot.add_or_refresh(item_at("error: linker failed", 2), &cap);
        slot.add_or_refresh(item_at("error: type mismatch", 1), &cap);

        let removed = slot.remove_matching("linker").unwrap();
        assert_eq!(removed.content, "error: linker failed");
        assert!(slot.remove_matching("linker").is_none());
        assert_eq!(slot.clear(), 1);
        assert!(slot.is_empty());
    }
}
