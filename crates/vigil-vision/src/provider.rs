use async_trait::async_trait;
use vigil_core::Result;

/// A request to the vision boundary.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// Provider-specific model id, e.g. "gpt-4o".
    pub model: String,
    /// System prompt describing the expected JSON reply.
    pub system: String,
    /// Task context: goal, recent history, screen metadata.
    pub prompt: String,
    /// Base64-encoded PNG of the current screen.
    pub image_base64: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Trait implemented by each vision provider (OpenAI-compatible, mock).
///
/// Returns the model's raw text reply; interpretation belongs to the
/// decision engine.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Human-readable name, e.g. "openai", "mock".
    fn name(&self) -> &str;

    /// Send a request and return the raw reply text.
    async fn complete(&self, request: &VisionRequest) -> Result<String>;
}
