//! The boundary between the assistant and an LLM backend.
//!
//! Every backend can complete a prompt as free text. Backends that can
//! also constrain their output to a JSON schema expose that through the
//! separate `StructuredInvoke` capability, which the assistant checks
//! for explicitly before deciding how to ask for JSON.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// What a backend returned for a plain completion. Some backends hand
/// back the bare text, others the whole message object.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelResponse {
    Text(String),
    Object(Value),
}

impl ModelResponse {
    /// Textual content of the response. Objects prefer their `content`
    /// field and otherwise serialize as a whole.
    pub fn into_content(self) -> String {
        match self {
            ModelResponse::Text(text) => text,
            ModelResponse::Object(value) => match value.get("content") {
                Some(Value::String(content)) => content.clone(),
                Some(Value::Null) | None => value.to_string(),
                Some(other) => other.to_string(),
            },
        }
    }
}

/// A JSON schema with the name the response object is wrapped under.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    /// Wraps `inner` so the model must answer with `{ <key>: inner }`.
    pub fn wrapped(key: &str, inner: Value) -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": { key: inner },
            "required": [key]
        });
        Self {
            name: key.to_string(),
            schema,
        }
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Free-text completion of a role-tagged prompt.
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponse>;

    /// Schema-enforced output, when the backend supports it.
    fn structured(&self) -> Option<&dyn StructuredInvoke> {
        None
    }

    /// Provider name used in logs.
    fn provider_name(&self) -> &str;
}

#[async_trait]
pub trait StructuredInvoke: Send + Sync {
    /// Completion constrained to `schema`. Returns the parsed object.
    async fn invoke_structured(&self, messages: &[Message], schema: &OutputSchema)
    -> Result<Value>;
}

pub type BoxedModelClient = Box<dyn ModelClient>;

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponse> {
        (**self).invoke(messages).await
    }

    fn structured(&self) -> Option<&dyn StructuredInvoke> {
        (**self).structured()
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}
