//! # vigil-agent
//!
//! The autonomy loop: a long-lived task that repeatedly drives
//! capture → decide → execute under a cancellation token, bounded by a step
//! budget and deadline. The control surface reads its state and requests
//! transitions; the loop owns the state machine.

pub mod controller;

pub use controller::{AutonomyController, AutonomyState};
