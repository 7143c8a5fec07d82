//! Host-facing entry points
//!
//! `ContextEngine` ties the memory store, pressure monitor, intervention
//! trigger and pruner to a storage backend. Every mutating call holds the
//! session's lock across its load-mutate-save cycle. Persistence failures
//! are logged and swallowed: memory is advisory and must never block the
//! agent loop.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{LookupError, Result};
use crate::memory::{
    Category, ExtractorRegistry, MemoryItem, MemoryPolicy, RecordOutcome, SessionMemoryState,
};
use crate::pressure::intervention::dispatch;
use crate::pressure::monitor::usage_ratio;
use crate::pressure::{
    Intervention, InterventionChannel, InterventionTrigger, LogChannel, PressureLevel,
    PressureMonitor, PressureSample, PressureThresholds,
};
use crate::pruning::Pruner;
use crate::session::{NoopSessionLineage, SessionId, SessionLineage, SessionLocks};
use crate::storage::{DocumentStore, FileKvStore, KvStore};

/// Result of one pressure sample
#[derive(Debug)]
pub struct PressureReport {
    pub sample: PressureSample,
    /// Set when this sample escalated into `High` and an intervention was
    /// handed to the channel
    pub intervention: Option<Intervention>,
    delivery: Option<JoinHandle<()>>,
}

impl PressureReport {
    /// Wait until the intervention, if any, has been handed to the channel.
    ///
    /// Short-lived hosts must call this before their runtime shuts down or the
    /// background delivery is cancelled. Delivery failures are logged by the
    /// delivery task and never surface here.
    pub async fn delivered(&mut self) {
        if let Some(handle) = self.delivery.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Intervention delivery task aborted");
            }
        }
    }
}

/// Result of observing one tool output
#[derive(Debug, Clone)]
pub struct ObservedOutput {
    /// The pruned text to hand back to the host
    pub output: String,
    /// Facts extracted from the raw output and recorded
    pub recorded: Vec<RecordOutcome>,
}

pub struct ContextEngine {
    documents: DocumentStore,
    policy: MemoryPolicy,
    monitor: PressureMonitor,
    trigger: InterventionTrigger,
    pruner: Pruner,
    extractors: ExtractorRegistry,
    channel: Arc<dyn InterventionChannel>,
    lineage: Arc<dyn SessionLineage>,
    locks: SessionLocks,
}

impl std::fmt::Debug for ContextEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextEngine")
            .field("documents", &self.documents)
            .field("policy", &self.policy)
            .field("channel", &self.channel.name())
            .field("sessions", &self.locks.len())
            .finish()
    }
}

impl ContextEngine {
    /// Engine with default policy over the given backend
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            documents: DocumentStore::new(store),
            policy: MemoryPolicy::default(),
            monitor: PressureMonitor::default(),
            trigger: InterventionTrigger::default(),
            pruner: Pruner::default(),
            extractors: ExtractorRegistry::with_defaults(),
            channel: Arc::new(LogChannel),
            lineage: Arc::new(NoopSessionLineage),
            locks: SessionLocks::new(),
        }
    }

    /// Engine configured from `config` over the given backend.
    ///
    /// Fails only on invalid configuration.
    pub fn from_config(config: &Config, store: Arc<dyn KvStore>) -> Result<Self> {
        Ok(Self {
            policy: MemoryPolicy::from_config(&config.memory)?,
            monitor: PressureMonitor::new(PressureThresholds::from_config(&config.pressure)?),
            trigger: InterventionTrigger::from_config(&config.intervention),
            pruner: Pruner::from_config(&config.pruning),
            ..Self::new(store)
        })
    }

    /// Engine configured from `config`, persisting to its data directory
    pub async fn open(config: &Config) -> Result<Self> {
        let store = FileKvStore::open(&config.storage.data_dir).await?;
        tracing::debug!(dir = %store.dir().display(), "Opened session store");
        Self::from_config(config, Arc::new(store))
    }

    pub fn with_channel(mut self, channel: Arc<dyn InterventionChannel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_lineage(mut self, lineage: Arc<dyn SessionLineage>) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn policy(&self) -> &MemoryPolicy {
        &self.policy
    }

    pub fn monitor(&self) -> &PressureMonitor {
        &self.monitor
    }

    pub fn pruner(&self) -> &Pruner {
        &self.pruner
    }

    pub fn lineage(&self) -> &Arc<dyn SessionLineage> {
        &self.lineage
    }

    /// Record one fact. Returns `None` for derived sessions, which do not
    /// keep their own memory.
    pub async fn record_fact(
        &self,
        session: &SessionId,
        category: Category,
        content: &str,
        source: &str,
    ) -> Option<RecordOutcome> {
        if self.skip_derived(session, "record") {
            return None;
        }

        let _guard = self.locks.acquire(session).await;
        let mut state = self.documents.load_memory(session, &self.policy).await;
        let outcome = state.record(category, content, source, &self.policy);
        if let Some(warning) = &outcome.warning {
            tracing::warn!(session = %session, category = ?category, "{warning}");
        }
        tracing::debug!(
            session = %session,
            category = ?category,
            merged = outcome.merged,
            evicted = outcome.evicted.len(),
            "Recorded fact"
        );
        self.save_memory(&state).await;
        Some(outcome)
    }

    /// Remove every item of `category`; returns the count removed
    pub async fn clear_category(&self, session: &SessionId, category: Category) -> usize {
        let _guard = self.locks.acquire(session).await;
        let mut state = self.documents.load_memory(session, &self.policy).await;
        let removed = state.clear_category(category, &self.policy);
        if removed > 0 {
            tracing::info!(session = %session, category = ?category, removed, "Cleared category");
            self.save_memory(&state).await;
        }
        removed
    }

    /// Remove the first item whose content contains `needle`
    pub async fn forget(
        &self,
        session: &SessionId,
        needle: &str,
    ) -> std::result::Result<MemoryItem, LookupError> {
        let _guard = self.locks.acquire(session).await;
        let mut state = self.documents.load_memory(session, &self.policy).await;
        let item = state.remove_by_content_match(needle)?;
        tracing::info!(session = %session, category = ?item.category, "Forgot memory item");
        self.save_memory(&state).await;
        Ok(item)
    }

    /// Replace the session's pressure sample with a new one, dispatching an
    /// intervention on escalation into `High`
    pub async fn sample_pressure(&self, session: &SessionId, ratio: f64) -> PressureReport {
        let _guard = self.locks.acquire(session).await;
        let previous = self.documents.load_pressure(session).await;
        let sample = self.monitor.sample(session.clone(), ratio, previous.as_ref());

        if sample.level != sample.previous_level {
            tracing::info!(
                session = %session,
                from = %sample.previous_level,
                to = %sample.level,
                ratio = sample.usage_ratio,
                "Pressure level changed"
            );
        }

        if let Err(e) = self.documents.save_pressure(&sample).await {
            tracing::warn!(session = %session, error = %e, "Failed to save pressure sample");
        }

        let intervention = if self.skip_derived(session, "intervention") {
            None
        } else {
            self.trigger.evaluate(&sample)
        };
        let delivery = intervention
            .as_ref()
            .map(|intervention| dispatch(self.channel.clone(), intervention.clone()));

        PressureReport {
            sample,
            intervention,
            delivery,
        }
    }

    /// Sample from raw usage figures; a zero or invalid capacity reads as
    /// no pressure
    pub async fn sample_usage(
        &self,
        session: &SessionId,
        used: f64,
        capacity: f64,
    ) -> PressureReport {
        let ratio = usage_ratio(used, capacity).unwrap_or_else(|| {
            tracing::debug!(session = %session, used, capacity, "Unusable usage figures, reporting safe");
            0.0
        });
        self.sample_pressure(session, ratio).await
    }

    /// Level from the session's live sample, `Safe` if none
    pub async fn current_level(&self, session: &SessionId) -> PressureLevel {
        self.documents
            .load_pressure(session)
            .await
            .map(|s| s.level)
            .unwrap_or_default()
    }

    /// Compress a tool output at the session's current pressure level
    pub async fn prune_output(&self, session: &SessionId, source: &str, text: &str) -> String {
        let level = self.current_level(session).await;
        self.pruner.prune(source, text, level)
    }

    /// Extract facts from a raw tool output, record them, then prune it
    pub async fn observe_tool_output(
        &self,
        session: &SessionId,
        source: &str,
        text: &str,
    ) -> ObservedOutput {
        let mut recorded = Vec::new();

        if self.extractors.handles(source) && !self.skip_derived(session, "extract") {
            let candidates = self.extractors.extract(source, text);
            if !candidates.is_empty() {
                let _guard = self.locks.acquire(session).await;
                let mut state = self.documents.load_memory(session, &self.policy).await;
                for candidate in candidates {
                    let outcome =
                        state.record(candidate.category, &candidate.content, source, &self.policy);
                    recorded.push(outcome);
                }
                tracing::debug!(session = %session, source, facts = recorded.len(), "Extracted facts");
                self.save_memory(&state).await;
            }
        }

        let output = self.prune_output(session, source, text).await;
        ObservedOutput { output, recorded }
    }

    /// Current memory state; does not save
    pub async fn snapshot(&self, session: &SessionId) -> SessionMemoryState {
        self.documents.load_memory(session, &self.policy).await
    }

    /// Live pressure sample; does not save
    pub async fn pressure(&self, session: &SessionId) -> Option<PressureSample> {
        self.documents.load_pressure(session).await
    }

    /// Remove everything held for a deleted session
    pub async fn session_deleted(&self, session: &SessionId) {
        let guard = self.locks.acquire(session).await;
        if let Err(e) = self.documents.delete_session(session).await {
            tracing::warn!(session = %session, error = %e, "Failed to delete session documents");
        }
        self.lineage.forget(session);
        self.locks.release_and_remove(session, guard);
        tracing::info!(session = %session, "Session deleted");
    }

    fn skip_derived(&self, session: &SessionId, what: &str) -> bool {
        match self.lineage.parent_of(session) {
            Some(parent) => {
                tracing::debug!(session = %session, parent = %parent, "Derived session, skipping {what}");
                true
            }
            None => false,
        }
    }

    async fn save_memory(&self, state: &SessionMemoryState) {
        if let Err(e) = self.documents.save_memory(state).await {
            tracing::warn!(session = %state.session_id, error = %e, "Failed to save memory state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use crate::testing::{FailingKvStore, RecordingChannel};

    fn sid(s: &str) -> SessionId {
        SessionId::try_from(s).unwrap()
    }

    fn engine() -> ContextEngine {
        ContextEngine::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn test_record_persists_between_calls() {
        let engine = engine();
        let s = sid("persist");
        engine.record_fact(&s, Category::Decision, "use tokio", "manual").await;
        engine.record_fact(&s, Category::Decision, "use tokio", "manual").await;

        let state = engine.snapshot(&s).await;
        let items = state.items(Category::Decision);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].mentions, 2);
    }

    #[tokio::test]
    async fn test_failing_backend_never_errors() {
        let engine = ContextEngine::new(Arc::new(FailingKvStore));
        let s = sid("broken");

        let outcome = engine
            .record_fact(&s, Category::Error, "boom", "bash")
            .await
            .unwrap();
        assert!(outcome.retained);
        assert!(engine.snapshot(&s).await.is_empty());
        assert_eq!(engine.sample_pressure(&s, 0.5).await.sample.level, PressureLevel::Safe);
        engine.session_deleted(&s).await;
    }

    #[tokio::test]
    async fn test_forget_miss_is_typed() {
        let engine = engine();
        let err = engine.forget(&sid("empty"), "nothing").await.unwrap_err();
        assert_eq!(err, LookupError::NotFound("nothing".to_string()));
    }

    #[tokio::test]
    async fn test_intervention_delivered_to_channel() {
        let (channel, mut rx) = RecordingChannel::new();
        let engine = engine().with_channel(Arc::new(channel));
        let s = sid("hot");

        assert!(engine.sample_pressure(&s, 0.8).await.intervention.is_none());
        let report = engine.sample_pressure(&s, 0.95).await;
        assert!(report.intervention.is_some());

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.session_id, s);
    }

    /// Channel that yields once before forwarding, like a real network hop
    struct YieldingChannel(RecordingChannel);

    #[async_trait::async_trait]
    impl InterventionChannel for YieldingChannel {
        async fn notify(&self, session: &SessionId, message: &str) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.notify(session, message).await
        }

        fn name(&self) -> &'static str {
            "yielding"
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_delivered_waits_for_channel() {
        let (channel, mut rx) = RecordingChannel::new();
        let engine = engine().with_channel(Arc::new(YieldingChannel(channel)));
        let s = sid("short-lived");

        let mut report = engine.sample_pressure(&s, 0.95).await;
        assert!(report.intervention.is_some());
        report.delivered().await;

        let delivered = rx.try_recv().expect("delivered before returning");
        assert_eq!(delivered.session_id, s);

        // A second wait is a no-op
        report.delivered().await;
    }

    #[tokio::test]
    async fn test_delivered_swallows_channel_failure() {
        let engine = engine().with_channel(Arc::new(crate::testing::FailingChannel));
        let mut report = engine.sample_pressure(&sid("unreachable"), 0.95).await;
        assert!(report.intervention.is_some());
        report.delivered().await;
    }

    #[tokio::test]
    async fn test_delivered_without_intervention() {
        let mut report = engine().sample_pressure(&sid("calm"), 0.1).await;
        assert!(report.intervention.is_none());
        report.delivered().await;
    }

    #[tokio::test]
    async fn test_zero_capacity_reads_safe() {
        let engine = engine();
        let report = engine.sample_usage(&sid("zero"), 500.0, 0.0).await;
        assert_eq!(report.sample.level, PressureLevel::Safe);
        assert_eq!(report.sample.usage_ratio, 0.0);
    }

    #[tokio::test]
    async fn test_prune_follows_session_pressure() {
        let engine = engine();
        let s = sid("prune");
        let text = "line\n".repeat(500);

        let relaxed = engine.prune_output(&s, "list", &text).await;
        assert_eq!(relaxed, text);

        engine.sample_pressure(&s, 0.95).await;
        let squeezed = engine.prune_output(&s, "list", &text).await;
        assert!(squeezed.contains("lines omitted"));
        assert!(squeezed.len() < text.len());
    }
}
