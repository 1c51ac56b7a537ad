//! Mock vision provider for deterministic testing.
//!
//! Returns pre-queued replies without making any HTTP calls.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use vigil_core::{Result, VigilError};

use crate::provider::{VisionProvider, VisionRequest};

/// A pre-configured reply from the mock provider.
#[derive(Clone)]
enum MockReply {
    Text(String),
    Error(String),
}

/// A vision provider that replays queued responses.
///
/// # Example
/// ```
/// use vigil_vision::MockProvider;
/// let provider = MockProvider::new()
///     .with_response(r#"{"type":"task_complete"}"#);
/// ```
pub struct MockProvider {
    replies: Arc<Mutex<Vec<MockReply>>>,
    /// Every request received, for assertions in tests.
    requests: Arc<Mutex<Vec<VisionRequest>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(vec![])),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Queue a raw text reply.
    pub fn with_response(self, text: &str) -> Self {
        self.replies.lock().unwrap().push(MockReply::Text(text.to_string()));
        self
    }

    /// Queue a provider error.
    pub fn with_error(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(MockReply::Error(message.to_string()));
        self
    }

    /// All requests made to this provider so far.
    pub fn recorded_requests(&self) -> Vec<VisionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> MockReply {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            MockReply::Text("(mock: no more queued responses)".into())
        } else {
            replies.remove(0)
        }
    }
}

#[async_trait]
impl VisionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &VisionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        match self.next_reply() {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(message) => Err(VigilError::Vision(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VisionRequest {
        VisionRequest {
            model: "mock".into(),
            system: String::new(),
            prompt: "tick".into(),
            image_base64: String::new(),
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn test_replies_in_order() {
        let provider = MockProvider::new()
            .with_response("first")
            .with_response("second");
        assert_eq!(provider.complete(&request()).await.unwrap(), "first");
        assert_eq!(provider.complete(&request()).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_error_reply() {
        let provider = MockProvider::new().with_error("HTTP 429");
        assert!(provider.complete(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_records_requests() {
        let provider = MockProvider::new().with_response("ok");
        let _ = provider.complete(&request()).await;
        let recorded = provider.recorded_requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].prompt, "tick");
    }
}
