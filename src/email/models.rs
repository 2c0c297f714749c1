//! Inputs and results of the email assistant. All of these are built
//! fresh for each call and never stored.
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_MAX_SUMMARY_BULLETS: usize = 3;
pub const MAX_QUICK_REPLIES: usize = 3;

#[derive(ValueEnum, Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Neutral,
    Friendly,
    Formal,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Tone::Neutral => "neutral",
            Tone::Friendly => "friendly",
            Tone::Formal => "formal",
        };
        f.write_str(s)
    }
}

#[derive(ValueEnum, Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Concise,
    Detailed,
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Style::Concise => "concise",
            Style::Detailed => "detailed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Parses one of the three exact literals.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        };
        f.write_str(s)
    }
}

/// Knobs that shape the summary and the drafted reply.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftOptions {
    pub language: String,
    pub tone: Tone,
    pub style: Style,
    pub max_summary_bullets: usize,
    pub include_action_items: bool,
}

impl Default for DraftOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            tone: Tone::default(),
            style: Style::default(),
            max_summary_bullets: DEFAULT_MAX_SUMMARY_BULLETS,
            include_action_items: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub gist: String,
    pub bullets: Vec<String>,
    pub action_items: Vec<String>,
    pub sentiment: Sentiment,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedReply {
    pub subject: String,
    /// Reply text only, never the quoted original.
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeAndDraftOutput {
    pub summary: EmailSummary,
    pub draft_reply: SuggestedReply,
}

/// An email to summarize or reply to.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailInput {
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    /// Prior messages in the thread, newest last.
    #[serde(default)]
    pub thread_context: Vec<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub options: DraftOptions,
    /// Precomputed summary that guides the reply.
    #[serde(default)]
    pub summary: Option<EmailSummary>,
}

impl EmailInput {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Default::default()
        }
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn thread_context(mut self, messages: Vec<String>) -> Self {
        self.thread_context = messages;
        self
    }

    pub fn options(mut self, options: DraftOptions) -> Self {
        self.options = options;
        self
    }

    pub fn summary(mut self, summary: EmailSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Subject for a reply to this email when the model didn't give
    /// one. Never stacks a second "Re:".
    pub fn default_reply_subject(&self) -> String {
        match self.subject.as_deref() {
            Some(subject) if subject.to_lowercase().starts_with("re:") => subject.to_string(),
            Some(subject) => format!("Re: {}", subject),
            None => String::from("Re: Your email"),
        }
    }
}
