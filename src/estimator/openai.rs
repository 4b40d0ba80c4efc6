//! OpenAI-compatible vision client for meal estimation.
//!
//! Works against the OpenAI cloud API or any compatible endpoint (Ollama in
//! compatibility mode, vLLM, LM Studio). The photo travels as a base64
//! `data:` URI content part on a single chat-completion request.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{build_prompt, parse_estimate, MealEstimate, MealEstimator};
use crate::config::VisionConfig;
use crate::error::{AppError, Result};

pub struct OpenAiVisionEstimator {
    config: VisionConfig,
    client: reqwest::Client,
}

impl OpenAiVisionEstimator {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, image: &[u8], content_type: &str, name_hint: Option<&str>) -> ChatCompletionRequest {
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image);
        let data_uri = format!("data:{};base64,{}", content_type, image_b64);

        ChatCompletionRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: build_prompt(name_hint),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_uri },
                    },
                ],
            }],
        }
    }
}

#[async_trait]
impl MealEstimator for OpenAiVisionEstimator {
    async fn estimate(
        &self,
        image: &[u8],
        content_type: &str,
        name_hint: Option<&str>,
    ) -> Result<MealEstimate> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = self.build_request(image, content_type, name_hint);

        let mut req = self
            .client
            .post(&url)
            .json(&request)
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs));
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::EstimationService(format!(
                    "vision request timed out after {}s",
                    self.config.timeout_secs
                ))
            } else {
                AppError::EstimationService(format!("vision request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EstimationService(format!(
                "vision API returned {}: {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            AppError::EstimationService(format!("failed to read vision response: {}", e))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::EstimationService("model returned no content".into()))?;

        parse_estimate(&content, name_hint)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VisionConfig {
        VisionConfig {
            base_url: "http://localhost:11434/v1".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            timeout_secs: 30,
            max_tokens: 350,
        }
    }

    #[test]
    fn test_request_shape() {
        let estimator = OpenAiVisionEstimator::new(test_config());
        let request = estimator.build_request(b"fakejpeg", "image/jpeg", Some("ramen"));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 350);
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert!(json["messages"][0]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("'ramen'"));
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert!(json["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant",
                "content": "{\"meal_name\": \"Ramen\"}"}, "finish_reason": "stop"}]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"meal_name\": \"Ramen\"}")
        );
    }
}
