//! Working memory for a session
//!
//! Facts land either in a fixed-capacity slot (guaranteed retention,
//! FIFO) or in the shared pool (score decays every event, low scorers
//! are evicted). Which one is decided by the category table in
//! [`policy`], never by the caller.

pub mod extract;
pub mod policy;
pub mod pool;
pub mod slots;
pub mod state;
pub mod types;

pub use extract::{Candidate, Extractor, ExtractorRegistry};
pub use policy::{CategoryBehavior, MemoryPolicy, PoolBehavior, SlotBehavior};
pub use pool::{PoolCollection, PoolUpdate};
pub use slots::{SlotCollection, SlotUpdate};
pub use state::{RecordOutcome, SessionMemoryState};
pub use types::{Category, MemoryItem};
