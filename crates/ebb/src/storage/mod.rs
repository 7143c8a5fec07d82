//! Session persistence
//!
//! The core only needs a narrow key-value interface. Documents are
//! serialized here and stored as opaque bytes, so any engine that can get,
//! put and delete by key can back ebb.

pub mod documents;
pub mod file;
pub mod kv;
pub mod memory;

pub use documents::DocumentStore;
pub use file::FileKvStore;
pub use kv::KvStore;
pub use memory::MemoryKvStore;
