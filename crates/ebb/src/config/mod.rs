use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{EbbError, Result};
use crate::pruning::Strategy;

/// Main configuration structure for ebb
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Where session documents are persisted
    #[serde(default)]
    pub storage: StorageConfig,
    /// Slot/pool memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Pressure level thresholds
    #[serde(default)]
    pub pressure: PressureConfig,
    /// Tool output pruning rules and limits
    #[serde(default)]
    pub pruning: PruningConfig,
    /// Intervention on escalation to high pressure
    #[serde(default)]
    pub intervention: InterventionConfig,
}

impl Config {
    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| EbbError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from `path`, or from the first default location
    /// that exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::read(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".ebb").join("config.toml")),
            dirs::config_dir().map(|c| c.join("ebb").join("config.toml")),
            Some(PathBuf::from("ebb.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::read(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Config::default())
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EbbError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base directory for session documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".ebb"))
        .unwrap_or_else(|| PathBuf::from(".ebb"))
}

/// Retention kind for one category in the `[memory.categories]` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategorySpec {
    /// Fixed-capacity FIFO
    Slot { capacity: usize },
    /// Shared decaying pool
    Pool,
}

/// Working memory configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Per-event score multiplier, strictly between 0 and 1
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// Score added to a pool item each time it is mentioned again
    #[serde(default = "default_mention_weight")]
    pub mention_weight: f64,
    /// Score of a newly inserted pool item
    #[serde(default = "default_initial_score")]
    pub initial_score: f64,
    /// Pool items scoring below this are evicted
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Maximum number of pool items
    #[serde(default = "default_max_pool_items")]
    pub max_pool_items: usize,
    /// Hard cap on fact length; longer content is truncated
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Category name -> slot or pool
    #[serde(default = "default_categories")]
    pub categories: BTreeMap<String, CategorySpec>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            decay_rate: default_decay_rate(),
            mention_weight: default_mention_weight(),
            initial_score: default_initial_score(),
            min_score: default_min_score(),
            max_pool_items: default_max_pool_items(),
            max_content_chars: default_max_content_chars(),
            categories: default_categories(),
        }
    }
}

fn default_decay_rate() -> f64 {
    0.85
}

fn default_mention_weight() -> f64 {
    0.5
}

fn default_initial_score() -> f64 {
    1.0
}

fn default_min_score() -> f64 {
    0.01
}

fn default_max_pool_items() -> usize {
    50
}

fn default_max_content_chars() -> usize {
    200
}

fn default_categories() -> BTreeMap<String, CategorySpec> {
    BTreeMap::from([
        ("decision".to_string(), CategorySpec::Slot { capacity: 10 }),
        ("error".to_string(), CategorySpec::Slot { capacity: 5 }),
        ("task".to_string(), CategorySpec::Slot { capacity: 5 }),
        ("file_path".to_string(), CategorySpec::Pool),
        ("discovery".to_string(), CategorySpec::Pool),
    ])
}

/// Pressure level thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PressureConfig {
    /// Usage ratio at which pressure becomes moderate (inclusive)
    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f64,
    /// Usage ratio at which pressure becomes high (inclusive)
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    /// How far below a threshold the ratio must fall before the level drops
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            moderate_threshold: default_moderate_threshold(),
            high_threshold: default_high_threshold(),
            hysteresis: default_hysteresis(),
        }
    }
}

fn default_moderate_threshold() -> f64 {
    0.75
}

fn default_high_threshold() -> f64 {
    0.90
}

fn default_hysteresis() -> f64 {
    0.15
}

/// Hard line/character ceiling applied under pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitConfig {
    pub max_lines: usize,
    pub max_chars: usize,
}

/// A `[pruning.moderate]` or `[pruning.high]` table as written; missing
/// fields fall back to that level's default
#[derive(Deserialize)]
struct PartialLimits {
    max_lines: Option<usize>,
    max_chars: Option<usize>,
}

impl PartialLimits {
    fn or(self, fallback: LimitConfig) -> LimitConfig {
        LimitConfig {
            max_lines: self.max_lines.unwrap_or(fallback.max_lines),
            max_chars: self.max_chars.unwrap_or(fallback.max_chars),
        }
    }
}

fn moderate_limits<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<LimitConfig, D::Error> {
    Ok(PartialLimits::deserialize(d)?.or(default_moderate_limits()))
}

fn high_limits<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<LimitConfig, D::Error> {
    Ok(PartialLimits::deserialize(d)?.or(default_high_limits()))
}

/// Tool output pruning configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PruningConfig {
    /// Strategy for sources with no rule
    #[serde(default = "default_pruning_rule")]
    pub default: Strategy,
    /// Ceiling applied at moderate pressure
    #[serde(default = "default_moderate_limits", deserialize_with = "moderate_limits")]
    pub moderate: LimitConfig,
    /// Ceiling applied at high pressure
    #[serde(default = "default_high_limits", deserialize_with = "high_limits")]
    pub high: LimitConfig,
    /// Per-source overrides, merged over the built-in table
    #[serde(default)]
    pub rules: BTreeMap<String, Strategy>,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            default: default_pruning_rule(),
            moderate: default_moderate_limits(),
            high: default_high_limits(),
            rules: BTreeMap::new(),
        }
    }
}

fn default_pruning_rule() -> Strategy {
    Strategy::KeepLast { chars: 2000 }
}

fn default_moderate_limits() -> LimitConfig {
    LimitConfig {
        max_lines: 200,
        max_chars: 8000,
    }
}

fn default_high_limits() -> LimitConfig {
    LimitConfig {
        max_lines: 80,
        max_chars: 3000,
    }
}

/// Intervention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterventionConfig {
    /// Send an intervention when pressure escalates to high
    #[serde(default = "default_intervention_enabled")]
    pub enabled: bool,
    /// Advisory text delivered to the host
    #[serde(default = "default_intervention_message")]
    pub message: String,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self {
            enabled: default_intervention_enabled(),
            message: default_intervention_message(),
        }
    }
}

fn default_intervention_enabled() -> bool {
    true
}

fn default_intervention_message() -> String {
    "Context usage is above 90%. Summarize progress, drop stale tool output, \
     and avoid large reads until usage falls."
        .to_string()
}
