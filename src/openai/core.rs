use std::time::Duration;

use anyhow::{Context, Error, Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::ai::model::{Message, ModelClient, ModelResponse, OutputSchema, StructuredInvoke};
use crate::core::{ApiError, RetryPolicy, is_transient, with_retry};

/// Builds the `response_format` for a JSON schema constrained
/// completion.
pub fn json_schema_format(schema: &OutputSchema) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": schema.name,
            "schema": schema.schema,
            "strict": false
        }
    })
}

pub async fn completion(
    messages: &[Message],
    response_format: Option<&Value>,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Value, Error> {
    let mut payload = json!({
        "model": model,
        "messages": messages,
    });
    if let Some(format) = response_format {
        payload["response_format"] = format.clone();
    }
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 10))
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ApiError::new("OpenAI", status, error_text).into());
    }

    Ok(response.json().await?)
}

// Object {
//     "content": String("{\"summary\": ...}"),
//     "refusal": Null,
//     "role": String("assistant")
// }
fn first_message(resp: &Value) -> Result<&Value> {
    let message = &resp["choices"][0]["message"];
    if message.is_object() {
        Ok(message)
    } else {
        Err(anyhow!("Completion has no message: {}", resp))
    }
}

pub struct OpenAiClient {
    api_hostname: String,
    api_key: String,
    model: String,
    structured_output: bool,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            structured_output: true,
            retry: RetryPolicy::default(),
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

    async fn complete(&self, messages: &[Message], response_format: Option<&Value>) -> Result<Value> {
        with_retry(
            &self.retry,
            || {
                completion(
                    messages,
                    response_format,
                    &self.api_hostname,
                    &self.api_key,
                    &self.model,
                )
            },
            is_transient,
        )
        .await
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponse> {
        let resp = self.complete(messages, None).await?;
        Ok(ModelResponse::Object(first_message(&resp)?.clone()))
    }

    fn structured(&self) -> Option<&dyn StructuredInvoke> {
        if self.structured_output {
            Some(self)
        } else {
            None
        }
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl StructuredInvoke for OpenAiClient {
    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value> {
        let format = json_schema_format(schema);
        let resp = self.complete(messages, Some(&format)).await?;
        let message = first_message(&resp)?;
        if let Some(refusal) = message["refusal"].as_str() {
            bail!("Model refused to answer: {}", refusal);
        }
        let content = message["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Completion message has no content"))?;
        serde_json::from_str(content).context("Structured completion is not JSON")
    }
}
