//! Gemini generateContent client.
//!
//! Gemini has no system role in `contents`. System messages are joined
//! into `systemInstruction` and assistant turns are sent as `model`.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::ai::model::{Message, ModelClient, ModelResponse, OutputSchema, Role, StructuredInvoke};
use crate::core::{ApiError, RetryPolicy, is_transient, with_retry};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

pub struct GeminiClient {
    api_base: String,
    api_key: String,
    model: String,
    structured_output: bool,
    retry: RetryPolicy,
    http: Client,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            structured_output: true,
            retry: RetryPolicy::default(),
            http: Client::new(),
        }
    }

    pub fn api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.to_string();
        self
    }

    pub fn structured_output(mut self, enabled: bool) -> Self {
        self.structured_output = enabled;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn request_body(&self, messages: &[Message], schema: Option<&OutputSchema>) -> Value {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {"maxOutputTokens": DEFAULT_MAX_OUTPUT_TOKENS}
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if let Some(schema) = schema {
            body["generationConfig"]["responseMimeType"] = json!("application/json");
            body["generationConfig"]["responseJsonSchema"] = schema.schema.clone();
        }
        body
    }

    /// Posts the request and returns the concatenated text of the first
    /// candidate.
    async fn generate(&self, body: &Value) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        );

        let resp: Value = with_retry(
            &self.retry,
            || async {
                let response = self
                    .http
                    .post(&url)
                    .header("x-goog-api-key", &self.api_key)
                    .timeout(Duration::from_secs(60 * 5))
                    .json(body)
                    .send()
                    .await
                    .context("Failed to send request to Gemini")?;

                let status = response.status();
                if !status.is_success() {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(anyhow::Error::new(ApiError::new("Gemini", status, error_text)));
                }

                response
                    .json::<Value>()
                    .await
                    .context("Failed to parse Gemini response")
            },
            is_transient,
        )
        .await?;

        candidate_text(&resp)
    }
}

fn candidate_text(resp: &Value) -> Result<String> {
    // A blocked prompt has no candidates at all, only the feedback
    if let Some(reason) = resp["promptFeedback"]["blockReason"].as_str() {
        bail!("Gemini blocked the prompt (blockReason: {})", reason);
    }

    let candidate = &resp["candidates"][0];
    let parts = candidate["content"]["parts"].as_array().ok_or_else(|| {
        anyhow!(
            "Gemini returned no content (finishReason: {})",
            candidate["finishReason"].as_str().unwrap_or("unknown")
        )
    })?;

    Ok(parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<Vec<_>>()
        .join(""))
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponse> {
        let text = self.generate(&self.request_body(messages, None)).await?;
        Ok(ModelResponse::Text(text))
    }

    fn structured(&self) -> Option<&dyn StructuredInvoke> {
        if self.structured_output {
            Some(self)
        } else {
            None
        }
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl StructuredInvoke for GeminiClient {
    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value> {
        let text = self
            .generate(&self.request_body(messages, Some(schema)))
            .await?;
        serde_json::from_str(&text).context("Gemini structured output is not JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const PATH: &str = "/v1beta/models/gemini-2.5-pro:generateContent";

    fn client(url: &str) -> GeminiClient {
        GeminiClient::new("test-key", "gemini-2.5-pro")
            .api_base(url)
            .retry_policy(RetryPolicy::none())
    }

    fn messages() -> Vec<Message> {
        vec![
            Message::new(Role::System, "You are a test."),
            Message::new(Role::User, "Hi"),
            Message::new(Role::Assistant, "Hello"),
            Message::new(Role::User, "Bye"),
        ]
    }

    #[test]
    fn test_request_body_splits_system_instruction() {
        let body = client("http://localhost").request_body(&messages(), None);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are a test.");
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "Bye");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert!(body["generationConfig"]["responseMimeType"].is_null());
    }

    #[test]
    fn test_request_body_with_schema() {
        let schema = OutputSchema::wrapped("summary", json!({"type": "object"}));
        let body = client("http://localhost").request_body(&messages(), Some(&schema));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseJsonSchema"], schema.schema);
    }

    #[tokio::test]
    async fn test_invoke_joins_candidate_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "contents": [{"role": "user", "parts": [{"text": "Hi"}]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"there"}]},"finishReason":"STOP"}]}"#)
            .create();

        let resp = client(&server.url())
            .invoke(&[Message::new(Role::User, "Hi")])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(resp, ModelResponse::Text(String::from("Hello there")));
    }

    #[tokio::test]
    async fn test_invoke_structured_parses_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_body(Matcher::PartialJson(json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"{\"draftReply\":{\"subject\":\"Re: Hi\",\"body\":\"Ok\"}}"}]}}]}"#)
            .create();

        let schema = OutputSchema::wrapped("draftReply", json!({"type": "object"}));
        let value = client(&server.url())
            .invoke_structured(&messages(), &schema)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(value["draftReply"]["body"], "Ok");
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#)
            .create();

        let err = client(&server.url())
            .invoke(&messages())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_blocked_prompt_reports_block_reason() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"promptFeedback":{"blockReason":"PROHIBITED_CONTENT"}}"#)
            .create();

        let err = client(&server.url())
            .invoke(&messages())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("PROHIBITED_CONTENT"));
    }

    #[tokio::test]
    async fn test_rejected_schema_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"status":"INVALID_ARGUMENT"}}"#)
            .expect(1)
            .create();

        let gemini = GeminiClient::new("test-key", "gemini-2.5-pro")
            .api_base(&server.url())
            .retry_policy(RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)));
        let schema = OutputSchema::wrapped("summary", json!({"type": "object"}));
        let err = gemini
            .invoke_structured(&messages(), &schema)
            .await
            .unwrap_err();

        mock.assert();
        assert!(err.to_string().contains("INVALID_ARGUMENT"));
    }
}
