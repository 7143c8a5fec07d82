//! Tool output pruning
//!
//! Each tool source maps to a compression [`Strategy`]. Under moderate or
//! high pressure a hard line and character ceiling is applied before the
//! strategy runs, so the same tool output shrinks as the session fills up.

pub mod compress;
pub mod rules;

pub use compress::{PressureLimits, Pruner, compress};
pub use rules::{PruningRule, RuleTable, Strategy};
