//! Test utilities for ebb - channel and storage doubles
//!
//! These are public so integration tests and downstream hosts can exercise
//! the engine without a real delivery channel or backend.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{EbbError, Result};
use crate::pressure::InterventionChannel;
use crate::session::SessionId;
use crate::storage::KvStore;

/// A delivered intervention as seen by [`RecordingChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub session_id: SessionId,
    pub message: String,
}

/// Channel that forwards every delivery to an unbounded receiver
#[derive(Debug, Clone)]
pub struct RecordingChannel {
    tx: mpsc::UnboundedSender<Delivered>,
}

impl RecordingChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivered>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl InterventionChannel for RecordingChannel {
    async fn notify(&self, session: &SessionId, message: &str) -> Result<()> {
        self.tx
            .send(Delivered {
                session_id: session.clone(),
                message: message.to_string(),
            })
            .map_err(|e| EbbError::Delivery(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Channel whose deliveries always fail
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingChannel;

#[async_trait]
impl InterventionChannel for FailingChannel {
    async fn notify(&self, _session: &SessionId, _message: &str) -> Result<()> {
        Err(EbbError::Delivery("host unreachable".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Backend whose every operation fails
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingKvStore;

#[async_trait]
impl KvStore for FailingKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Err(EbbError::Storage(format!("read of {key} refused")))
    }

    async fn put(&self, key: &str, _value: Vec<u8>) -> Result<()> {
        Err(EbbError::Storage(format!("write of {key} refused")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Err(EbbError::Storage(format!("delete of {key} refused")))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
