//! # vigil-safety
//!
//! The safety governor: the single enforcement point every action must pass
//! before it may touch the input device. Both the autonomy loop and the
//! external control surface route through it — there is no path around it.

pub mod governor;
pub mod rate;

pub use governor::{EvalContext, SafetyGovernor, Verdict};
pub use rate::RateWindow;
