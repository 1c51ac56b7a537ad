use thiserror::Error;

/// Unified error type for the entire Vigil runtime.
#[derive(Error, Debug)]
pub enum VigilError {
    // ── Policy outcomes ────────────────────────────────────────
    #[error("action vetoed: {reason}")]
    Vetoed { reason: String },

    // ── Device / desktop boundary ──────────────────────────────
    #[error("device error: {0}")]
    Device(String),

    #[error("screen capture failed: {0}")]
    Capture(String),

    // ── Vision boundary ────────────────────────────────────────
    #[error("vision provider error: {0}")]
    Vision(String),

    #[error("decision decode failed: {0}")]
    Decode(String),

    // ── Autonomy state machine ─────────────────────────────────
    #[error("invalid state for {operation}: autonomy is {state}")]
    InvalidState { operation: String, state: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl VigilError {
    /// The veto reason, if this is a policy rejection.
    pub fn veto_reason(&self) -> Option<&str> {
        match self {
            VigilError::Vetoed { reason } => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VigilError>;
