//! # vigil-config
//!
//! Configuration for the Vigil desktop operator (`vigil.toml`).
//!
//! The configuration is loaded exactly once at process start. There is no
//! hot reload: the safety policy must not be mutable at runtime through a
//! side channel — the emergency-stop latch is the only runtime-mutable
//! safety state, and it lives in the governor, not here.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AgentConfig, DesktopConfig, LoggingConfig, RestrictedZone, SafetyConfig, ServerConfig,
    VigilConfig,
};
