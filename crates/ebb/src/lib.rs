//! ebb - bounded, decaying working memory for long-running agents
//!
//! This crate keeps a per-session working set of facts (guaranteed slots
//! plus an exponentially decaying pool), tracks context pressure with
//! hysteresis, and prunes tool output more aggressively as pressure rises.

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod pressure;
pub mod pruning;
pub mod session;
pub mod storage;
pub mod testing;

pub use engine::ContextEngine;
pub use error::{EbbError, LookupError};
