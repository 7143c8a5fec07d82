pub mod config;
pub mod memory;
pub mod pressure;
pub mod prune;
pub mod session;

pub use config::ConfigCommand;
pub use memory::MemoryCommand;
pub use pressure::PressureCommand;
pub use prune::PruneCommand;
pub use session::SessionCommand;
