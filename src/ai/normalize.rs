//! Turns whatever a model said into typed summaries and replies.
//!
//! Parsing and coercion are separate steps. `parse_model_json` is the
//! only place that can fail: text that isn't JSON at all has nothing to
//! salvage. Once there is a JSON value, `coerce_summary` and
//! `coerce_reply` never fail and fill anything missing or mistyped with
//! a default.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::ai::error::AssistantError;
use crate::ai::model::OutputSchema;
use crate::email::models::MAX_QUICK_REPLIES;
use crate::email::{EmailInput, EmailSummary, Sentiment, SuggestedReply};

pub const SUMMARY_KEY: &str = "summary";
pub const DRAFT_REPLY_KEY: &str = "draftReply";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("Invalid code fence regex"));

/// Removes Markdown code fences (```json and bare ```) and the
/// whitespace around the content.
pub fn strip_code_fences(content: &str) -> String {
    CODE_FENCE.replace_all(content, "").trim().to_string()
}

/// Parses model output as JSON after stripping code fences.
pub fn parse_model_json(content: &str) -> Result<Value, AssistantError> {
    let cleaned = strip_code_fences(content);
    serde_json::from_str(&cleaned)
        .map_err(|source| AssistantError::MalformedModelOutput { content: cleaned, source })
}

fn string_or_default(value: &Value) -> String {
    value.as_str().map(str::to_string).unwrap_or_default()
}

// Non-string entries of an otherwise valid array are dropped
fn strings_or_empty(value: &Value) -> Vec<String> {
    match value.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        None => Vec::new(),
    }
}

fn sentiment_or_neutral(value: &Value) -> Sentiment {
    value.as_str().and_then(Sentiment::parse).unwrap_or_default()
}

/// Reads `summary.*` out of a parsed response.
pub fn coerce_summary(parsed: &Value) -> EmailSummary {
    let summary = &parsed[SUMMARY_KEY];
    EmailSummary {
        gist: string_or_default(&summary["gist"]),
        bullets: strings_or_empty(&summary["bullets"]),
        action_items: strings_or_empty(&summary["actionItems"]),
        sentiment: sentiment_or_neutral(&summary["sentiment"]),
    }
}

/// Reads `draftReply.*` out of a parsed response. A missing subject is
/// derived from the subject of the email being answered.
pub fn coerce_reply(parsed: &Value, input: &EmailInput) -> SuggestedReply {
    let reply = &parsed[DRAFT_REPLY_KEY];
    let subject = match reply["subject"].as_str() {
        Some(subject) => subject.to_string(),
        None => input.default_reply_subject(),
    };
    let mut quick_replies = strings_or_empty(&reply["quickReplies"]);
    quick_replies.truncate(MAX_QUICK_REPLIES);

    SuggestedReply {
        subject,
        body: string_or_default(&reply["body"]),
        quick_replies,
    }
}

/// Schema for `{ "summary": { ... } }`.
pub fn summary_schema() -> OutputSchema {
    OutputSchema::wrapped(
        SUMMARY_KEY,
        json!({
            "type": "object",
            "properties": {
                "gist": {"type": "string"},
                "bullets": {"type": "array", "items": {"type": "string"}},
                "actionItems": {"type": "array", "items": {"type": "string"}},
                "sentiment": {"type": "string", "enum": ["positive", "neutral", "negative"]}
            },
            "required": ["gist", "bullets", "actionItems"]
        }),
    )
}

/// Schema for `{ "draftReply": { ... } }`.
pub fn draft_reply_schema() -> OutputSchema {
    OutputSchema::wrapped(
        DRAFT_REPLY_KEY,
        json!({
            "type": "object",
            "properties": {
                "subject": {"type": "string"},
                "body": {"type": "string"},
                "quickReplies": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["subject", "body"]
        }),
    )
}

// Shapes a structured response must deserialize into. Unlike the
// lenient coercion these reject anything off-schema, which sends the
// assistant down the prompted JSON path instead.

#[derive(Deserialize, Debug)]
pub struct SummaryEnvelope {
    summary: StructuredSummary,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StructuredSummary {
    gist: String,
    bullets: Vec<String>,
    action_items: Vec<String>,
    #[serde(default)]
    sentiment: Option<Sentiment>,
}

impl From<SummaryEnvelope> for EmailSummary {
    fn from(envelope: SummaryEnvelope) -> Self {
        let s = envelope.summary;
        EmailSummary {
            gist: s.gist,
            bullets: s.bullets,
            action_items: s.action_items,
            sentiment: s.sentiment.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct DraftReplyEnvelope {
    #[serde(rename = "draftReply")]
    draft_reply: StructuredReply,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StructuredReply {
    subject: String,
    body: String,
    #[serde(default)]
    quick_replies: Option<Vec<String>>,
}

impl From<DraftReplyEnvelope> for SuggestedReply {
    fn from(envelope: DraftReplyEnvelope) -> Self {
        let r = envelope.draft_reply;
        let mut quick_replies = r.quick_replies.unwrap_or_default();
        quick_replies.truncate(MAX_QUICK_REPLIES);
        SuggestedReply {
            subject: r.subject,
            body: r.body,
            quick_replies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY_JSON: &str = r#"{
  "summary": {
    "gist": "Alex wants an SDK integration timeline.",
    "bullets": ["Needs SSO (Okta)", "Needs webhook retries"],
    "actionItems": ["Propose Thursday or Friday"],
    "sentiment": "positive"
  }
}"#;

    #[test]
    fn test_strip_json_fence() {
        let fenced = format!("```json\n{}\n```", SUMMARY_JSON);
        assert_eq!(strip_code_fences(&fenced), SUMMARY_JSON);
    }

    #[test]
    fn test_strip_bare_fence_and_whitespace() {
        assert_eq!(strip_code_fences("  ```\n{\"a\": 1}\n```  \n"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_fenced_and_unfenced_normalize_identically() {
        let plain = coerce_summary(&parse_model_json(SUMMARY_JSON).unwrap());
        let fenced = coerce_summary(
            &parse_model_json(&format!("```json\n{}\n```", SUMMARY_JSON)).unwrap(),
        );
        let bare = coerce_summary(&parse_model_json(&format!("```{}```", SUMMARY_JSON)).unwrap());

        assert_eq!(plain, fenced);
        assert_eq!(plain, bare);
        assert_eq!(plain.gist, "Alex wants an SDK integration timeline.");
        assert_eq!(plain.sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_prose_is_malformed() {
        let err = parse_model_json("Sure! Here is a summary of the email.").unwrap_err();
        match err {
            AssistantError::MalformedModelOutput { content, .. } => {
                assert_eq!(content, "Sure! Here is a summary of the email.");
            }
            other => panic!("Expected MalformedModelOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_output_is_malformed() {
        assert!(matches!(
            parse_model_json("```json\n```"),
            Err(AssistantError::MalformedModelOutput { .. })
        ));
    }

    #[test]
    fn test_coerce_summary_defaults_missing_fields() {
        let summary = coerce_summary(&json!({"summary": {"gist": "Short"}}));
        assert_eq!(summary.gist, "Short");
        assert!(summary.bullets.is_empty());
        assert!(summary.action_items.is_empty());
        assert_eq!(summary.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_coerce_summary_of_wrong_shape() {
        for value in [json!({}), json!([1, 2]), json!("text"), json!(null), json!({"summary": 3})] {
            let summary = coerce_summary(&value);
            assert_eq!(summary, EmailSummary::default());
        }
    }

    #[test]
    fn test_coerce_summary_wrong_types() {
        let summary = coerce_summary(&json!({
            "summary": {
                "gist": 42,
                "bullets": "one bullet",
                "actionItems": ["call back", 7, null],
                "sentiment": "angry"
            }
        }));
        assert_eq!(summary.gist, "");
        assert!(summary.bullets.is_empty());
        assert_eq!(summary.action_items, vec!["call back"]);
        assert_eq!(summary.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_coerce_reply_subject_defaults() {
        let missing = json!({"draftReply": {"body": "Thanks!"}});

        let reply = coerce_reply(&missing, &EmailInput::new("b"));
        assert_eq!(reply.subject, "Re: Your email");
        assert_eq!(reply.body, "Thanks!");

        let reply = coerce_reply(&missing, &EmailInput::new("b").subject("Hello"));
        assert_eq!(reply.subject, "Re: Hello");

        let reply = coerce_reply(&missing, &EmailInput::new("b").subject("Re: Hello"));
        assert_eq!(reply.subject, "Re: Hello");

        let reply = coerce_reply(&missing, &EmailInput::new("b").subject("rE: hello"));
        assert_eq!(reply.subject, "rE: hello");
    }

    #[test]
    fn test_coerce_reply_keeps_model_subject() {
        let reply = coerce_reply(
            &json!({"draftReply": {"subject": "Timeline", "body": "Hi"}}),
            &EmailInput::new("b").subject("Hello"),
        );
        assert_eq!(reply.subject, "Timeline");
    }

    #[test]
    fn test_coerce_reply_quick_replies() {
        let reply = coerce_reply(
            &json!({"draftReply": {"quickReplies": ["a", "b", "c", "d"]}}),
            &EmailInput::new("b"),
        );
        assert_eq!(reply.quick_replies, vec!["a", "b", "c"]);
        assert_eq!(reply.body, "");

        let reply = coerce_reply(
            &json!({"draftReply": {"quickReplies": "yes"}}),
            &EmailInput::new("b"),
        );
        assert!(reply.quick_replies.is_empty());
    }

    #[test]
    fn test_summary_envelope_defaults_sentiment() {
        let envelope: SummaryEnvelope = serde_json::from_value(json!({
            "summary": {"gist": "g", "bullets": ["b"], "actionItems": []}
        }))
        .unwrap();
        let summary = EmailSummary::from(envelope);
        assert_eq!(summary.sentiment, Sentiment::Neutral);
        assert_eq!(summary.bullets, vec!["b"]);
    }

    #[test]
    fn test_summary_envelope_rejects_off_schema() {
        let result = serde_json::from_value::<SummaryEnvelope>(json!({"gist": "unwrapped"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_reply_envelope() {
        let envelope: DraftReplyEnvelope = serde_json::from_value(json!({
            "draftReply": {"subject": "Re: x", "body": "Hi", "quickReplies": ["1", "2", "3", "4"]}
        }))
        .unwrap();
        let reply = SuggestedReply::from(envelope);
        assert_eq!(reply.subject, "Re: x");
        assert_eq!(reply.quick_replies.len(), 3);
    }

    #[test]
    fn test_schemas_wrap_named_keys() {
        let summary = summary_schema();
        assert_eq!(summary.name, "summary");
        assert_eq!(
            summary.schema["properties"]["summary"]["properties"]["sentiment"]["enum"][2],
            "negative"
        );

        let reply = draft_reply_schema();
        assert_eq!(reply.name, "draftReply");
        assert_eq!(reply.schema["required"][0], "draftReply");
    }
}
