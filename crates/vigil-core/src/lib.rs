//! # vigil-core
//!
//! Core types for the Vigil desktop operator. This crate defines the shared
//! vocabulary used by every other crate in the workspace: the action model,
//! the append-only activity log, and the unified error type.

pub mod action;
pub mod error;
pub mod log;
pub mod task;
pub mod window;

pub use action::{Action, ActionSource};
pub use error::{Result, VigilError};
pub use log::{ActionOutcome, ActionRecord, ActivityLog, ControlEvent, LoggedOp};
pub use task::TaskSpec;
pub use window::WindowInfo;
