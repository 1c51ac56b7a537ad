use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use vigil_core::{Result, VigilError};

use crate::provider::{VisionProvider, VisionRequest};

/// OpenAI-compatible chat-completions vision provider.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
        }
    }

    /// Point at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_request_body(&self, request: &VisionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                {
                    "role": "system",
                    "content": request.system,
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": request.prompt },
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/png;base64,{}", request.image_base64),
                                "detail": "high",
                            },
                        },
                    ],
                },
            ],
        })
    }
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &VisionRequest) -> Result<String> {
        let body = self.build_request_body(request);
        debug!(model = %request.model, "sending vision API request");

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| VigilError::Vision(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(VigilError::Vision(format!(
                "API returned {}: {}",
                status,
                text.trim()
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VigilError::Vision(e.to_string()))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| VigilError::Vision("response has no message content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let provider = OpenAiProvider::new("sk-test".into());
        let request = VisionRequest {
            model: "gpt-4o".into(),
            system: "be precise".into(),
            prompt: "what next?".into(),
            image_base64: "aGVsbG8=".into(),
            max_tokens: 1000,
            temperature: 0.1,
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        let image_url = body["messages"][1]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(image_url.starts_with("data:image/png;base64,aGVsbG8="));
    }
}
