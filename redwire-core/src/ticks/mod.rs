//! Periodic tick driver.
//!
//! An automaton runs one pass per step while it has work. The loop starts on
//! demand when work is fed and stops itself once a pass leaves nothing to do.
//!
//! # Architecture
//!
//! - [`Periodic`] - A target that can run one pass and report whether it is idle
//! - [`PeriodicTask`] - The start/stop handle owning the running loop

mod periodic;

pub use periodic::{Periodic, PeriodicTask};
