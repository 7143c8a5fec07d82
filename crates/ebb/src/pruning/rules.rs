//! Source -> strategy rule table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::PruningConfig;

/// How a block of tool output is compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum Strategy {
    /// Leave the text unchanged
    KeepAll,
    /// Keep a prefix and a suffix, drop the middle
    KeepEnds { first_chars: usize, last_chars: usize },
    /// Keep only the final characters
    KeepLast { chars: usize },
    /// Keep the leading characters as a stand-in summary
    Summarize { chars: usize },
    /// Replace the text with a short acknowledgement
    Discard,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::KeepAll => "keep-all",
            Strategy::KeepEnds { .. } => "keep-ends",
            Strategy::KeepLast { .. } => "keep-last",
            Strategy::Summarize { .. } => "summarize",
            Strategy::Discard => "discard",
        }
    }
}

/// A resolved rule for one source identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruningRule {
    pub source: String,
    pub strategy: Strategy,
    /// True when no rule matched and the default was used
    pub is_default: bool,
}

/// Exact-match table of per-source strategies with a fallback
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: HashMap<String, Strategy>,
    default: Strategy,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::from_config(&PruningConfig::default())
    }
}

impl RuleTable {
    /// Built-in rules, overridden and extended by `config.rules`
    pub fn from_config(config: &PruningConfig) -> Self {
        let mut rules = builtin_rules();
        for (source, strategy) in &config.rules {
            rules.insert(source.clone(), *strategy);
        }
        Self {
            rules,
            default: config.default,
        }
    }

    /// Look up the rule for `source` (case-sensitive), falling back to the
    /// default strategy.
    pub fn resolve(&self, source: &str) -> PruningRule {
        match self.rules.get(source) {
            Some(strategy) => PruningRule {
                source: source.to_string(),
                strategy: *strategy,
                is_default: false,
            },
            None => PruningRule {
                source: source.to_string(),
                strategy: self.default,
                is_default: true,
            },
        }
    }

    pub fn default_strategy(&self) -> Strategy {
        self.default
    }

    /// Configured sources, sorted
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        sources.sort_unstable();
        sources
    }
}

fn builtin_rules() -> HashMap<String, Strategy> {
    let table = [
        ("bash", Strategy::KeepEnds { first_chars: 1500, last_chars: 1500 }),
        ("read", Strategy::KeepEnds { first_chars: 3000, last_chars: 1000 }),
        ("grep", Strategy::Summarize { chars: 2000 }),
        ("glob", Strategy::Summarize { chars: 1500 }),
        ("webfetch", Strategy::Summarize { chars: 3000 }),
        ("task", Strategy::KeepLast { chars: 3000 }),
        ("edit", Strategy::Discard),
        ("write", Strategy::Discard),
        ("todowrite", Strategy::Discard),
        ("list", Strategy::KeepAll),
    ];
    table
        .into_iter()
        .map(|(source, strategy)| (source.to_string(), strategy))
        .collect()
}
