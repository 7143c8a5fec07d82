//! Session document (de)serialization over a [`KvStore`]
//!
//! Loads never fail: a missing document and an unparseable one both yield
//! a fresh default, with the latter logged. Saves report errors so the
//! caller can decide to log them.

use std::sync::Arc;

use crate::error::Result;
use crate::memory::{MemoryPolicy, SessionMemoryState, SlotCollection};
use crate::pressure::PressureSample;
use crate::session::SessionId;
use crate::storage::kv::KvStore;

const MEMORY_SUFFIX: &str = "memory";
const PRESSURE_SUFFIX: &str = "pressure";

/// Typed access to the two per-session documents
#[derive(Clone)]
pub struct DocumentStore {
    kv: Arc<dyn KvStore>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("backend", &self.kv.name())
            .finish()
    }
}

fn key(session: &SessionId, suffix: &str) -> String {
    format!("{session}.{suffix}")
}

impl DocumentStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn backend(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Load a session's memory, or a fresh state if absent or unreadable
    pub async fn load_memory(&self, session: &SessionId, policy: &MemoryPolicy) -> SessionMemoryState {
        let bytes = match self.kv.get(&key(session, MEMORY_SUFFIX)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return SessionMemoryState::new(session.clone(), policy),
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "Failed to read memory document, starting fresh");
                return SessionMemoryState::new(session.clone(), policy);
            }
        };

        match decode_memory(&bytes) {
            Ok(mut state) if &state.session_id == session => {
                for (category, _) in policy.slot_categories() {
                    state.slots.entry(category).or_insert_with(SlotCollection::new);
                }
                state
            }
            Ok(state) => {
                tracing::warn!(
                    session = %session,
                    found = %state.session_id,
                    "Memory document belongs to another session, starting fresh"
                );
                SessionMemoryState::new(session.clone(), policy)
            }
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "Corrupt memory document, starting fresh");
                SessionMemoryState::new(session.clone(), policy)
            }
        }
    }

    pub async fn save_memory(&self, state: &SessionMemoryState) -> Result<()> {
        let bytes = encode_memory(state)?;
        self.kv.put(&key(&state.session_id, MEMORY_SUFFIX), bytes).await
    }

    /// Load the live pressure sample, or `None` if absent or unreadable
    pub async fn load_pressure(&self, session: &SessionId) -> Option<PressureSample> {
        let bytes = match self.kv.get(&key(session, PRESSURE_SUFFIX)).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "Failed to read pressure document");
                return None;
            }
        };

        match serde_json::from_slice::<PressureSample>(&bytes) {
            Ok(sample) if &sample.session_id == session => Some(sample),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "Corrupt pressure document, ignoring");
                None
            }
        }
    }

    pub async fn save_pressure(&self, sample: &PressureSample) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(sample)?;
        self.kv.put(&key(&sample.session_id, PRESSURE_SUFFIX), bytes).await
    }

    /// Remove both documents for a session. Both deletes are attempted; the
    /// first failure is returned.
    pub async fn delete_session(&self, session: &SessionId) -> Result<()> {
        let memory = self.kv.delete(&key(session, MEMORY_SUFFIX)).await;
        let pressure = self.kv.delete(&key(session, PRESSURE_SUFFIX)).await;
        memory.and(pressure)
    }

    /// Raw persisted bytes of a session's memory document
    pub async fn raw_memory(&self, session: &SessionId) -> Result<Option<Vec<u8>>> {
        self.kv.get(&key(session, MEMORY_SUFFIX)).await
    }
}

pub fn encode_memory(state: &SessionMemoryState) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(state)?)
}

pub fn decode_memory(bytes: &[u8]) -> Result<SessionMemoryState> {
    Ok(serde_json::from_slice(bytes)?)
}
