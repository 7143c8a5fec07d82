//! Context pressure tracking
//!
//! The host reports a usage ratio once per turn. The monitor turns it into
//! a discrete [`PressureLevel`], holding the previous level while the ratio
//! sits inside the hysteresis band so a session hovering at a threshold
//! does not flap. The [`intervention`] trigger watches level transitions.

pub mod intervention;
pub mod monitor;

pub use intervention::{Intervention, InterventionChannel, InterventionTrigger, LogChannel};
pub use monitor::{PressureLevel, PressureMonitor, PressureSample, PressureThresholds};
