//! Category routing and scoring parameters
//!
//! The category table is resolved once from configuration. After that,
//! every recorded fact is dispatched on its [`CategoryBehavior`] instead
//! of inspecting category names at call sites.

use std::collections::BTreeMap;

use crate::config::{CategorySpec, MemoryConfig};
use crate::error::{EbbError, Result};
use crate::memory::types::Category;

/// Retention parameters for one FIFO slot category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBehavior {
    /// Maximum number of items kept; always at least 1
    pub capacity: usize,
}

/// Scoring parameters for the shared decaying pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolBehavior {
    /// Per-event score multiplier, strictly inside (0, 1)
    pub decay_rate: f64,
    /// Boost added to the item mentioned on a tick
    pub mention_weight: f64,
    /// Score given to a newly inserted item
    pub initial_score: f64,
    /// Items scoring below this are evicted
    pub min_score: f64,
    /// Maximum pool size; always at least 1
    pub max_items: usize,
}

impl Default for PoolBehavior {
    fn default() -> Self {
        Self {
            decay_rate: 0.85,
            mention_weight: 0.5,
            initial_score: 1.0,
            min_score: 0.01,
            max_items: 50,
        }
    }
}

impl PoolBehavior {
    /// Number of unmentioned events an item at `initial_score` survives
    /// before falling below `min_score`.
    pub fn survival_events(&self) -> u64 {
        let ratio = self.min_score / self.initial_score;
        if ratio >= 1.0 || ratio <= 0.0 {
            return 0;
        }
        (ratio.ln() / self.decay_rate.ln()).floor() as u64
    }
}

/// How a category retains its items
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CategoryBehavior {
    Slot(SlotBehavior),
    Pool,
}

/// Resolved memory policy: category table, pool parameters, content cap
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPolicy {
    categories: BTreeMap<Category, CategoryBehavior>,
    pool: PoolBehavior,
    max_content_chars: usize,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        let categories = BTreeMap::from([
            (Category::Decision, CategoryBehavior::Slot(SlotBehavior { capacity: 10 })),
            (Category::Error, CategoryBehavior::Slot(SlotBehavior { capacity: 5 })),
            (Category::Task, CategoryBehavior::Slot(SlotBehavior { capacity: 5 })),
            (Category::FilePath, CategoryBehavior::Pool),
            (Category::Discovery, CategoryBehavior::Pool),
        ]);
        Self {
            categories,
            pool: PoolBehavior::default(),
            max_content_chars: 200,
        }
    }
}

impl MemoryPolicy {
    /// Resolve and validate the policy from configuration.
    pub fn from_config(config: &MemoryConfig) -> Result<Self> {
        if !(config.decay_rate > 0.0 && config.decay_rate < 1.0) {
            return Err(EbbError::Config(format!(
                "memory.decay_rate must be strictly between 0 and 1, got {}",
                config.decay_rate
            )));
        }
        if config.max_pool_items == 0 {
            return Err(EbbError::Config(
                "memory.max_pool_items must be at least 1".to_string(),
            ));
        }
        if config.max_content_chars == 0 {
            return Err(EbbError::Config(
                "memory.max_content_chars must be at least 1".to_string(),
            ));
        }
        if config.min_score < 0.0 || config.mention_weight < 0.0 || config.initial_score <= 0.0 {
            return Err(EbbError::Config(
                "memory scores must be non-negative and initial_score positive".to_string(),
            ));
        }
        // Otherwise every new pool item is evicted on the ingest that adds it
        if config.initial_score < config.min_score {
            return Err(EbbError::Config(format!(
                "memory.initial_score ({}) must not be below memory.min_score ({})",
                config.initial_score, config.min_score
            )));
        }

        let mut categories = BTreeMap::new();
        for (name, spec) in &config.categories {
            let category: Category = name
                .parse()
                .map_err(|e| EbbError::Config(format!("memory.categories: {e}")))?;
            let behavior = match spec {
                CategorySpec::Slot { capacity: 0 } => {
                    return Err(EbbError::Config(format!(
                        "memory.categories.{name}: slot capacity must be at least 1"
                    )));
                }
                CategorySpec::Slot { capacity } => {
                    CategoryBehavior::Slot(SlotBehavior { capacity: *capacity })
                }
                CategorySpec::Pool => CategoryBehavior::Pool,
            };
            if categories.insert(category, behavior).is_some() {
                return Err(EbbError::Config(format!(
                    "memory.categories: {category} configured more than once"
                )));
            }
        }

        if let Some(missing) = Category::ALL.iter().find(|c| !categories.contains_key(c)) {
            return Err(EbbError::Config(format!(
                "memory.categories: no behavior configured for {missing}"
            )));
        }

        Ok(Self {
            categories,
            pool: PoolBehavior {
                decay_rate: config.decay_rate,
                mention_weight: config.mention_weight,
                initial_score: config.initial_score,
                min_score: config.min_score,
                max_items: config.max_pool_items,
            },
            max_content_chars: config.max_content_chars,
        })
    }

    pub fn behavior(&self, category: Category) -> CategoryBehavior {
        // Every category is present after validation; Default covers all too.
        self.categories
            .get(&category)
            .copied()
            .unwrap_or(CategoryBehavior::Pool)
    }

    pub fn pool(&self) -> &PoolBehavior {
        &self.pool
    }

    pub fn max_content_chars(&self) -> usize {
        self.max_content_chars
    }

    /// Slot categories in removal-priority order
    pub fn slot_categories(&self) -> impl Iterator<Item = (Category, SlotBehavior)> + '_ {
        self.categories.iter().filter_map(|(c, b)| match b {
            CategoryBehavior::Slot(slot) => Some((*c, *slot)),
            CategoryBehavior::Pool => None,
        })
    }

    pub fn is_slot(&self, category: Category) -> bool {
        matches!(self.behavior(category), CategoryBehavior::Slot(_))
    }
}
