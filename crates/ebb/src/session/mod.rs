//! Session identity and per-session coordination
//!
//! Every piece of state in ebb is partitioned by session. This module
//! validates session identifiers, serializes mutations within a session,
//! and remembers which sessions were spawned from a parent.

pub mod id;
pub mod lineage;
pub mod locks;

pub use id::{SessionId, SessionIdError};
pub use lineage::{LruSessionLineage, NoopSessionLineage, SessionLineage};
pub use locks::SessionLocks;
