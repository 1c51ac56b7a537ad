//! # vigil-desktop
//!
//! The desktop-environment boundary for Vigil, and the executor that sits
//! in front of it.
//!
//! - [`DesktopBackend`] — pointer/keyboard synthesis and window management,
//!   implemented over `xdotool` and `wmctrl` subprocesses ([`XdoBackend`]).
//! - [`ScreenCapture`] — framebuffer reads via `scrot` ([`ScrotCapture`]).
//! - [`ActionExecutor`] — the single mutual-exclusion point between the
//!   autonomy loop and the control surface. Every action passes the safety
//!   governor under the device lock, and every attempt lands in the
//!   activity log exactly once.
//!
//! The `mock` module provides recording in-memory implementations of both
//! traits for downstream tests.

pub mod backend;
pub mod capture;
pub mod executor;
pub mod mock;

pub use backend::{DesktopBackend, XdoBackend};
pub use capture::{Frame, ScreenCapture, ScrotCapture};
pub use executor::{ActionExecutor, ActionOutput};
