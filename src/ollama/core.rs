//! Client for a local Ollama server using the non-streaming chat API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::ai::model::{Message, ModelClient, ModelResponse, OutputSchema, StructuredInvoke};
use crate::core::{ApiError, RetryPolicy, is_transient, with_retry};

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_RETRIES: u32 = 4;

pub struct OllamaClient {
    host: String,
    model: String,
    structured_output: bool,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(host: &str, model: &str) -> Self {
        Self {
            host: host.to_string(),
            model: model.to_string(),
            structured_output: true,
            retry: RetryPolicy::new(
                DEFAULT_MAX_RETRIES,
                Duration::from_millis(500),
                Duration::from_secs(10),
            ),
            http: reqwest::Client::new(),
        }
    }

    pub fn structured_output(mut self, enabled: bool) -> Self {
        self.structured_output = enabled;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sends the chat request and returns the raw response body. When
    /// `format` is set Ollama constrains the output to that JSON schema.
    async fn chat(&self, messages: &[Message], format: Option<&Value>) -> Result<Value> {
        let mut payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {"temperature": DEFAULT_TEMPERATURE}
        });
        if let Some(format) = format {
            payload["format"] = format.clone();
        }
        let url = format!("{}/api/chat", self.host.trim_end_matches('/'));

        with_retry(
            &self.retry,
            || async {
                let response = self
                    .http
                    .post(&url)
                    .timeout(Duration::from_secs(60 * 5))
                    .json(&payload)
                    .send()
                    .await
                    .context("Failed to send request to Ollama")?;

                let status = response.status();
                if !status.is_success() {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(anyhow::Error::new(ApiError::new("Ollama", status, error_text)));
                }

                response
                    .json::<Value>()
                    .await
                    .context("Failed to parse Ollama response")
            },
            is_transient,
        )
        .await
    }
}

fn message_of(body: &Value) -> Result<&Value> {
    body.get("message")
        .filter(|m| m.is_object())
        .ok_or_else(|| anyhow!("Ollama response missing message: {}", body))
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponse> {
        let body = self.chat(messages, None).await?;
        Ok(ModelResponse::Object(message_of(&body)?.clone()))
    }

    fn structured(&self) -> Option<&dyn StructuredInvoke> {
        if self.structured_output {
            Some(self)
        } else {
            None
        }
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

#[async_trait]
impl StructuredInvoke for OllamaClient {
    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value> {
        let body = self.chat(messages, Some(&schema.schema)).await?;
        let content = message_of(&body)?["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Ollama message has no text content"))?;
        serde_json::from_str(content)
            .with_context(|| format!("Ollama structured output is not JSON: {}", content))
    }
}
