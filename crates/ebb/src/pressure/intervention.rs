//! One-shot intervention on escalation into high pressure
//!
//! An intervention fires only when a sample enters `High` from a lower
//! level. Repeated `High` samples never re-fire, and neither does a
//! de-escalation. Delivery is fire-and-forget: a failing channel is logged
//! and otherwise ignored.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::InterventionConfig;
use crate::error::Result;
use crate::pressure::monitor::{PressureLevel, PressureSample};
use crate::session::SessionId;

/// Advisory payload handed to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub session_id: SessionId,
    pub message: String,
    pub usage_ratio: f64,
    pub triggered_at: DateTime<Utc>,
}

/// One-way delivery channel to the host
#[async_trait]
pub trait InterventionChannel: Send + Sync {
    /// Deliver `message` for `session`. Errors are logged by the caller,
    /// never retried.
    async fn notify(&self, session: &SessionId, message: &str) -> Result<()>;

    /// Channel name for logging
    fn name(&self) -> &'static str;
}

/// Channel that only writes the intervention to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl InterventionChannel for LogChannel {
    async fn notify(&self, session: &SessionId, message: &str) -> Result<()> {
        tracing::warn!(session = %session, "Intervention: {message}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Decides whether a sample warrants an intervention
#[derive(Debug, Clone)]
pub struct InterventionTrigger {
    enabled: bool,
    message: String,
}

impl Default for InterventionTrigger {
    fn default() -> Self {
        Self::from_config(&InterventionConfig::default())
    }
}

impl InterventionTrigger {
    pub fn from_config(config: &InterventionConfig) -> Self {
        Self {
            enabled: config.enabled,
            message: config.message.clone(),
        }
    }

    /// True exactly when the sample escalates into `High`
    pub fn should_fire(sample: &PressureSample) -> bool {
        sample.level == PressureLevel::High && sample.previous_level < PressureLevel::High
    }

    pub fn evaluate(&self, sample: &PressureSample) -> Option<Intervention> {
        if !self.enabled || !Self::should_fire(sample) {
            return None;
        }
        Some(Intervention {
            session_id: sample.session_id.clone(),
            message: self.message.clone(),
            usage_ratio: sample.usage_ratio,
            triggered_at: sample.sampled_at,
        })
    }
}

/// Deliver an intervention in the background. The returned handle may be
/// dropped; delivery failures are logged inside the task.
pub fn dispatch(
    channel: Arc<dyn InterventionChannel>,
    intervention: Intervention,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let session = &intervention.session_id;
        match channel.notify(session, &intervention.message).await {
            Ok(()) => {
                tracing::info!(session = %session, channel = channel.name(), "Intervention delivered");
            }
            Err(e) => {
                tracing::warn!(
                    session = %session,
                    channel = channel.name(),
                    error = %e,
                    "Intervention delivery failed"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::monitor::PressureMonitor;

    fn run(ratios: &[f64]) -> Vec<usize> {
        let monitor = PressureMonitor::default();
        let trigger = InterventionTrigger::default();
        let session = SessionId::try_from("trigger-test").unwrap();

        let mut previous: Option<PressureSample> = None;
        let mut fired = Vec::new();
        for (i, ratio) in ratios.iter().enumerate() {
            let sample = monitor.sample(session.clone(), *ratio, previous.as_ref());
            if trigger.evaluate(&sample).is_some() {
                fired.push(i);
            }
            previous = Some(sample);
        }
        fired
    }

    #[test]
    fn test_fires_once_on_escalation() {
        assert_eq!(run(&[0.5, 0.8, 0.95, 0.96, 0.97]), vec![2]);
    }

    #[test]
    fn test_no_refire_while_hovering() {
        assert_eq!(run(&[0.95, 0.95, 0.80, 0.95]), vec![0]);
    }

    #[test]
    fn test_refires_after_full_release() {
        assert_eq!(run(&[0.95, 0.5, 0.95]), vec![0, 2]);
    }

    #[test]
    fn test_deescalation_never_fires() {
        assert!(run(&[0.5, 0.3, 0.1]).is_empty());
    }

    #[test]
    fn test_disabled_trigger() {
        let trigger = InterventionTrigger::from_config(&InterventionConfig {
            enabled: false,
            ..InterventionConfig::default()
        });
        let sample = PressureMonitor::default().sample(
            SessionId::try_from("off").unwrap(),
            0.99,
            None,
        );
        assert!(InterventionTrigger::should_fire(&sample));
        assert!(trigger.evaluate(&sample).is_none());
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let intervention = Intervention {
            session_id: SessionId::try_from("s").unwrap(),
            message: "m".to_string(),
            usage_ratio: 0.95,
            triggered_at: Utc::now(),
        };
        let handle = dispatch(Arc::new(crate::testing::FailingChannel), intervention);
        assert!(handle.await.is_ok());
    }
}
