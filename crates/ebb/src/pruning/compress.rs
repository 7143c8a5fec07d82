//! Pressure-aware compression
//!
//! Everything here is a pure function of `(text, strategy, level)`. All
//! lengths are counted in `char`s.

use std::borrow::Cow;

use crate::config::{LimitConfig, PruningConfig};
use crate::pressure::PressureLevel;
use crate::pruning::rules::{PruningRule, RuleTable, Strategy};

/// Replacement text for discarded output
pub const DISCARD_ACK: &str = "[output discarded]";

/// Hard ceilings applied before the strategy at elevated pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressureLimits {
    pub moderate: LimitConfig,
    pub high: LimitConfig,
}

impl Default for PressureLimits {
    fn default() -> Self {
        let config = PruningConfig::default();
        Self {
            moderate: config.moderate,
            high: config.high,
        }
    }
}

impl PressureLimits {
    pub fn for_level(&self, level: PressureLevel) -> Option<&LimitConfig> {
        match level {
            PressureLevel::Safe => None,
            PressureLevel::Moderate => Some(&self.moderate),
            PressureLevel::High => Some(&self.high),
        }
    }
}

/// Compress `text` with `strategy` at the given pressure level.
pub fn compress(
    text: &str,
    strategy: &Strategy,
    level: PressureLevel,
    limits: &PressureLimits,
) -> String {
    let limited = match limits.for_level(level) {
        Some(limit) => enforce_limit(text, limit),
        None => Cow::Borrowed(text),
    };
    apply_strategy(&limited, strategy)
}

fn enforce_limit<'a>(text: &'a str, limit: &LimitConfig) -> Cow<'a, str> {
    let mut out = Cow::Borrowed(text);

    let line_count = out.lines().count();
    if line_count > limit.max_lines {
        let omitted = line_count - limit.max_lines;
        let mut kept = out
            .lines()
            .take(limit.max_lines)
            .collect::<Vec<_>>()
            .join("\n");
        kept.push_str(&format!("\n... [{omitted} lines omitted]"));
        out = Cow::Owned(kept);
    }

    let char_count = out.chars().count();
    if char_count > limit.max_chars {
        let omitted = char_count - limit.max_chars;
        let mut kept = head(&out, limit.max_chars).to_string();
        kept.push_str(&format!("\n... [{omitted} chars omitted]"));
        out = Cow::Owned(kept);
    }

    out
}

fn apply_strategy(text: &str, strategy: &Strategy) -> String {
    let len = text.chars().count();
    match *strategy {
        Strategy::KeepAll => text.to_string(),
        Strategy::KeepEnds {
            first_chars,
            last_chars,
        } => {
            let kept = first_chars.saturating_add(last_chars);
            if kept >= len {
                return text.to_string();
            }
            let omitted = len - kept;
            format!(
                "{}\n... [{omitted} chars omitted] ...\n{}",
                head(text, first_chars),
                tail(text, last_chars)
            )
        }
        Strategy::KeepLast { chars } => {
            if len <= chars {
                return text.to_string();
            }
            format!("[... {} chars omitted]\n{}", len - chars, tail(text, chars))
        }
        Strategy::Summarize { chars } => {
            if len <= chars {
                return text.to_string();
            }
            format!(
                "{}\n... [truncated: {} chars omitted]",
                head(text, chars),
                len - chars
            )
        }
        Strategy::Discard => DISCARD_ACK.to_string(),
    }
}

/// First `n` chars of `s`
fn head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Last `n` chars of `s`
fn tail(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Rule table plus pressure limits
#[derive(Debug, Clone, Default)]
pub struct Pruner {
    rules: RuleTable,
    limits: PressureLimits,
}

impl Pruner {
    pub fn new(rules: RuleTable, limits: PressureLimits) -> Self {
        Self { rules, limits }
    }

    pub fn from_config(config: &PruningConfig) -> Self {
        Self {
            rules: RuleTable::from_config(config),
            limits: PressureLimits {
                moderate: config.moderate,
                high: config.high,
            },
        }
    }

    pub fn resolve_rule(&self, source: &str) -> PruningRule {
        self.rules.resolve(source)
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Resolve the rule for `source` and compress `text` with it
    pub fn prune(&self, source: &str, text: &str, level: PressureLevel) -> String {
        let rule = self.resolve_rule(source);
        let out = compress(text, &rule.strategy, level, &self.limits);
        tracing::debug!(
            source,
            strategy = rule.strategy.name(),
            level = %level,
            before = text.len(),
            after = out.len(),
            "Pruned tool output"
        );
        out
    }
}
