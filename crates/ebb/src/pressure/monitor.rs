//! Usage ratio -> pressure level classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PressureConfig;
use crate::error::{EbbError, Result};
use crate::session::SessionId;

/// Discrete pressure severity, totally ordered Safe < Moderate < High
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    #[default]
    Safe,
    Moderate,
    High,
}

impl PressureLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PressureLevel::Safe => "safe",
            PressureLevel::Moderate => "moderate",
            PressureLevel::High => "high",
        }
    }
}

impl std::fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The live pressure reading for a session. Each sample replaces the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureSample {
    pub session_id: SessionId,
    pub usage_ratio: f64,
    pub level: PressureLevel,
    pub previous_level: PressureLevel,
    pub sampled_at: DateTime<Utc>,
}

impl PressureSample {
    /// Level went up compared to the previous sample
    pub fn is_escalation(&self) -> bool {
        self.level > self.previous_level
    }

    /// Level went down compared to the previous sample
    pub fn is_deescalation(&self) -> bool {
        self.level < self.previous_level
    }
}

/// Validated cut points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureThresholds {
    pub moderate: f64,
    pub high: f64,
    pub hysteresis: f64,
}

impl Default for PressureThresholds {
    fn default() -> Self {
        Self {
            moderate: 0.75,
            high: 0.90,
            hysteresis: 0.15,
        }
    }
}

impl PressureThresholds {
    pub fn from_config(config: &PressureConfig) -> Result<Self> {
        let valid = config.moderate_threshold > 0.0
            && config.moderate_threshold < config.high_threshold
            && config.hysteresis >= 0.0
            && config.hysteresis < config.moderate_threshold;
        if !valid {
            return Err(EbbError::Config(format!(
                "pressure thresholds need 0 < moderate < high and 0 <= hysteresis < moderate \
                 (got moderate={}, high={}, hysteresis={})",
                config.moderate_threshold, config.high_threshold, config.hysteresis
            )));
        }
        Ok(Self {
            moderate: config.moderate_threshold,
            high: config.high_threshold,
            hysteresis: config.hysteresis,
        })
    }
}

/// Stateless classifier; the previous sample is passed in by the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct PressureMonitor {
    thresholds: PressureThresholds,
}

impl PressureMonitor {
    pub fn new(thresholds: PressureThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PressureThresholds {
        &self.thresholds
    }

    /// Pure threshold classification with closed lower bounds.
    ///
    /// Malformed ratios (NaN, infinite, negative) classify as `Safe`.
    pub fn classify(&self, usage_ratio: f64) -> PressureLevel {
        if !usage_ratio.is_finite() || usage_ratio < 0.0 {
            return PressureLevel::Safe;
        }
        if usage_ratio >= self.thresholds.high {
            PressureLevel::High
        } else if usage_ratio >= self.thresholds.moderate {
            PressureLevel::Moderate
        } else {
            PressureLevel::Safe
        }
    }

    /// Classify with hysteresis against the previous level. Escalation is
    /// immediate; a level is only released once the ratio falls below its
    /// threshold minus the hysteresis margin.
    pub fn settle(&self, usage_ratio: f64, previous: PressureLevel) -> PressureLevel {
        let raw = self.classify(usage_ratio);
        if raw >= previous || !usage_ratio.is_finite() {
            return raw;
        }
        let t = &self.thresholds;
        match previous {
            PressureLevel::High if usage_ratio >= t.high - t.hysteresis => PressureLevel::High,
            PressureLevel::High => self.settle(usage_ratio, PressureLevel::Moderate),
            PressureLevel::Moderate if usage_ratio >= t.moderate - t.hysteresis => {
                PressureLevel::Moderate
            }
            _ => raw,
        }
    }

    /// Produce the next sample for a session, replacing `previous`.
    pub fn sample(
        &self,
        session_id: SessionId,
        usage_ratio: f64,
        previous: Option<&PressureSample>,
    ) -> PressureSample {
        let previous_level = previous.map(|p| p.level).unwrap_or_default();
        let level = self.settle(usage_ratio, previous_level);
        let usage_ratio = if usage_ratio.is_finite() && usage_ratio >= 0.0 {
            usage_ratio
        } else {
            tracing::warn!(session = %session_id, "Malformed usage ratio, treating as safe");
            0.0
        };

        PressureSample {
            session_id,
            usage_ratio,
            level,
            previous_level,
            sampled_at: Utc::now(),
        }
    }
}

/// Normalize `used / capacity`; `None` when the capacity is zero or either
/// input is not a finite non-negative number.
pub fn usage_ratio(used: f64, capacity: f64) -> Option<f64> {
    let valid = used.is_finite() && capacity.is_finite() && used >= 0.0 && capacity > 0.0;
    valid.then(|| used / capacity)
}
