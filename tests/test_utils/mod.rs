//! Test utilities for integration tests
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use mailwright::ai::{Message, ModelClient, ModelResponse, OutputSchema, StructuredInvoke};

pub const DEMO_SUBJECT: &str = "SDK integration timeline";

pub const DEMO_BODY: &str = "Hi Naol,

Following up on last week's demo. We'd like a timeline and estimate for integrating your SDK.
We need SSO (Okta) and webhook retries. Can you meet Thursday or Friday?

Best,
Alex";

pub const DEMO_SUMMARY: &str = r#"{
  "summary": {
    "gist": "Alex wants a timeline and estimate for the SDK integration.",
    "bullets": ["Needs SSO (Okta)", "Needs webhook retries", "Wants to meet Thursday or Friday"],
    "actionItems": ["Send a timeline and estimate", "Propose a meeting time"],
    "sentiment": "positive"
  }
}"#;

pub const DEMO_REPLY: &str = r#"{
  "draftReply": {
    "subject": "Re: SDK integration timeline",
    "body": "Hi Alex,\n\nThanks for following up. I'll send a timeline covering SSO and webhook retries. Thursday works for me.\n\nBest,\nNaol",
    "quickReplies": ["Thursday works", "Friday works", "Let me check"]
  }
}"#;

/// How the fixture behaves when asked for schema constrained output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Structured {
    Unsupported,
    Succeeds,
    Fails,
}

/// Model that answers with canned JSON and counts how it was called.
///
/// Requests mentioning `draftReply` get `reply`, everything else gets
/// `summary`. Structured requests pick by schema name.
pub struct FixtureModel {
    pub summary: String,
    pub reply: String,
    pub structured: Structured,
    pub plain_calls: AtomicUsize,
    pub structured_calls: AtomicUsize,
    pub prompts: Mutex<Vec<Vec<Message>>>,
}

impl FixtureModel {
    pub fn new(summary: &str, reply: &str) -> Self {
        Self {
            summary: summary.to_string(),
            reply: reply.to_string(),
            structured: Structured::Unsupported,
            plain_calls: AtomicUsize::new(0),
            structured_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// The demo answers from a well behaved model.
    pub fn demo() -> Self {
        Self::new(DEMO_SUMMARY, DEMO_REPLY)
    }

    pub fn with_structured(mut self, structured: Structured) -> Self {
        self.structured = structured;
        self
    }

    pub fn plain_calls(&self) -> usize {
        self.plain_calls.load(Ordering::SeqCst)
    }

    pub fn structured_calls(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }

    fn answer_for(&self, is_reply: bool) -> &str {
        if is_reply { &self.reply } else { &self.summary }
    }
}

#[async_trait]
impl ModelClient for FixtureModel {
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponse> {
        self.plain_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages.to_vec());
        let is_reply = messages.iter().any(|m| m.content.contains("draftReply"));
        Ok(ModelResponse::Text(self.answer_for(is_reply).to_string()))
    }

    fn structured(&self) -> Option<&dyn StructuredInvoke> {
        match self.structured {
            Structured::Unsupported => None,
            _ => Some(self),
        }
    }

    fn provider_name(&self) -> &str {
        "fixture"
    }
}

#[async_trait]
impl StructuredInvoke for FixtureModel {
    async fn invoke_structured(
        &self,
        _messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        if self.structured == Structured::Fails {
            bail!("schema not supported by this model");
        }
        let answer = self.answer_for(schema.name == "draftReply");
        Ok(serde_json::from_str(answer)?)
    }
}
