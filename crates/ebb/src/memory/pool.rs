//! Decaying scored pool
//!
//! Every ingest is one tick of the session's logical clock. All members
//! are re-scored to the same tick, so after an ingest the whole pool
//! shares one decay epoch:
//!
//! ```text
//! score' = score * decay_rate^(now - last_scored_at) [+ mention_weight if mentioned]
//! ```
//!
//! Only the item mentioned on the tick receives the boost. Members that
//! decay below `min_score` are evicted, then the pool is cut to the top
//! `max_items` by score.

use serde::{Deserialize, Serialize};

use crate::memory::policy::PoolBehavior;
use crate::memory::types::MemoryItem;

/// Result of ingesting an item into the pool
#[derive(Debug, Clone)]
pub struct PoolUpdate {
    /// The stored copy of the ingested item after scoring
    pub item: MemoryItem,
    /// True if an existing member with identical content was boosted
    pub merged: bool,
    /// False if the ingested item itself did not survive eviction
    pub retained: bool,
    /// Members removed by the score floor or the size cap
    pub evicted: Vec<MemoryItem>,
}

/// Apply `elapsed` ticks of exponential decay to `score`
pub fn decay(score: f64, decay_rate: f64, elapsed: u64) -> f64 {
    if elapsed == 0 {
        return score;
    }
    score * decay_rate.powf(elapsed as f64)
}

/// Pool members, ordered by score descending after every ingest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolCollection {
    items: Vec<MemoryItem>,
}

impl PoolCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one fact at logical time `now`.
    ///
    /// The caller advances the clock before calling; `now` must be
    /// strictly greater than any `last_scored_at` already in the pool.
    pub fn ingest(&mut self, item: MemoryItem, now: u64, behavior: &PoolBehavior) -> PoolUpdate {
        let mut merged = false;

        for member in &mut self.items {
            let elapsed = now.saturating_sub(member.last_scored_at.unwrap_or(now));
            let current = member.score.unwrap_or(behavior.initial_score);
            let decayed = decay(current, behavior.decay_rate, elapsed);

            if !merged && member.content == item.content {
                member.score = Some(decayed + behavior.mention_weight);
                member.mentions = member.mentions.saturating_add(1);
                member.created_at = item.created_at;
                member.source = item.source.clone();
                merged = true;
            } else {
                member.score = Some(decayed);
            }
            member.last_scored_at = Some(now);
        }

        if !merged {
            let mut fresh = item.clone();
            fresh.score = Some(behavior.initial_score);
            fresh.last_scored_at = Some(now);
            self.items.push(fresh);
        }

        let (kept, mut evicted): (Vec<_>, Vec<_>) = self
            .items
            .drain(..)
            .partition(|m| m.score.unwrap_or(0.0) >= behavior.min_score);
        self.items = kept;

        self.items.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
        });
        let max_items = behavior.max_items.max(1);
        if self.items.len() > max_items {
            evicted.extend(self.items.split_off(max_items));
        }

        let (stored, retained) = match self.items.iter().find(|m| m.content == item.content) {
            Some(found) => (found.clone(), true),
            None => {
                let gone = evicted
                    .iter()
                    .find(|m| m.content == item.content)
                    .cloned()
                    .unwrap_or(item);
                (gone, false)
            }
        };

        if !evicted.is_empty() {
            tracing::debug!(
                evicted = evicted.len(),
                remaining = self.items.len(),
                tick = now,
                "Pool eviction"
            );
        }

        PoolUpdate {
            item: stored,
            merged,
            retained,
            evicted,
        }
    }

    /// Remove every member of the given category; returns the count
    pub fn remove_category(&mut self, category: crate::memory::types::Category) -> usize {
        let before = self.items.len();
        self.items.retain(|m| m.category != category);
        before - self.items.len()
    }

    /// Remove the first member (highest score first) containing `needle`
    pub fn remove_matching(&mut self, needle: &str) -> Option<MemoryItem> {
        let index = self.items.iter().position(|m| m.content.contains(needle))?;
        Some(self.items.remove(index))
    }

    /// Members ordered by score descending
    pub fn items(&self) -> &[MemoryItem] {
        &self.items
    }

    pub fn get(&self, content: &str) -> Option<&MemoryItem> {
        self.items.iter().find(|m| m.content == content)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
