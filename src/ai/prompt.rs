//! Prompts for summarizing and replying to emails, rendered with
//! Handlebars. Handlebars can't do much without registering helpers
//! which is what we want when the rendered text embeds untrusted email
//! content. Escaping is turned off since none of this is HTML.

use std::fmt;

use handlebars::{Handlebars, RenderError, handlebars_helper};
use serde_json::json;

use crate::ai::model::{Message, Role};
use crate::email::{DraftOptions, EmailInput, EmailSummary};

// `@index` starts at 0 but threads are numbered from 1
handlebars_helper!(inc: |v: i64| format!("{}", v + 1));

pub const DEFAULT_PROMPT_VERSION: &str = "v1";
pub const DEFAULT_ROLE: &str = "an assistant that summarizes emails and drafts replies";

pub const SUMMARY_JSON_INSTRUCTIONS: &str = r#"Respond with ONLY valid JSON in this exact format (no markdown, no other text):
{
  "summary": {
    "gist": "one sentence summary here",
    "bullets": ["key point 1", "key point 2"],
    "actionItems": ["action 1", "action 2"],
    "sentiment": "positive or neutral or negative"
  }
}"#;

pub const DRAFT_REPLY_JSON_INSTRUCTIONS: &str = r#"Respond with ONLY valid JSON in this exact format (no markdown, no other text):
{
  "draftReply": {
    "subject": "Re: subject line here",
    "body": "email body text here",
    "quickReplies": ["optional quick reply 1", "optional quick reply 2"]
  }
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    System,
    Section,
    Email,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const SYSTEM_PROMPT: &str = "You are {{role}}. Prompt version: {{prompt_version}}.";

const SECTION_PROMPT: &str = r"
{{label}}
{{#if text}}
{{text}}
{{/if}}
{{#each items}}
- {{this}}
{{/each}}
";

const EMAIL_PROMPT: &str = r#"
Email subject: {{subject}}
{{#if thread_context}}
Thread context (newest last):
{{#each thread_context}}
[{{inc @index}}] {{this}}
{{/each}}
{{/if}}
Email body:
"""
{{body}}
"""
"#;

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_helper("inc", Box::new(inc));
    registry
        .register_template_string(&Prompt::System.to_string(), SYSTEM_PROMPT)
        .expect("Failed to register template");
    registry
        .register_template_string(&Prompt::Section.to_string(), SECTION_PROMPT)
        .expect("Failed to register template");
    registry
        .register_template_string(&Prompt::Email.to_string(), EMAIL_PROMPT)
        .expect("Failed to register template");
    registry
}

/// Which output the prompt asks the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Summarize,
    DraftReply,
}

impl Task {
    fn default_instruction(&self) -> Vec<String> {
        match self {
            Task::Summarize => vec![String::from("Summarize the email")],
            Task::DraftReply => vec![String::from(
                "Draft a reply to the email on behalf of its recipient",
            )],
        }
    }

    fn default_output_format(&self, options: &DraftOptions) -> Vec<String> {
        match self {
            Task::Summarize => {
                let action_items = if options.include_action_items {
                    "summary.actionItems ([] if none)"
                } else {
                    "summary.actionItems (always [])"
                };
                vec![
                    String::from("Return JSON with keys:"),
                    String::from("summary.gist (1–2 sentences)"),
                    format!(
                        "summary.bullets (max {} terse bullets)",
                        options.max_summary_bullets
                    ),
                    String::from(action_items),
                    String::from("summary.sentiment (positive|neutral|negative)"),
                ]
            }
            Task::DraftReply => vec![
                String::from("Return JSON with keys:"),
                String::from("draftReply.subject"),
                String::from("draftReply.body (the reply text only, without the quoted original)"),
                String::from("draftReply.quickReplies (0–3 short one-liners)"),
            ],
        }
    }

    /// The exact JSON shape demanded when structured output isn't
    /// available.
    pub fn json_instructions(&self) -> &'static str {
        match self {
            Task::Summarize => SUMMARY_JSON_INSTRUCTIONS,
            Task::DraftReply => DRAFT_REPLY_JSON_INSTRUCTIONS,
        }
    }
}

/// Overrides for the sections of the user prompt. Anything left empty
/// is omitted, except the instruction and output format which fall
/// back to the defaults of the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    pub prompt_version: String,
    pub role: String,
    pub instruction: Option<Vec<String>>,
    pub output_constraints: Vec<String>,
    pub style_or_tone: Vec<String>,
    pub output_format: Option<Vec<String>>,
    pub context: Option<String>,
    pub examples: Vec<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            prompt_version: DEFAULT_PROMPT_VERSION.to_string(),
            role: DEFAULT_ROLE.to_string(),
            instruction: None,
            output_constraints: Vec::new(),
            style_or_tone: Vec::new(),
            output_format: None,
            context: None,
            examples: Vec::new(),
        }
    }
}

pub struct PromptBuilder<'a> {
    templates: Handlebars<'a>,
    config: PromptConfig,
}

impl Default for PromptBuilder<'_> {
    fn default() -> Self {
        Self::new(PromptConfig::default())
    }
}

impl PromptBuilder<'_> {
    pub fn new(config: PromptConfig) -> Self {
        Self {
            templates: templates(),
            config,
        }
    }

    /// System and user messages asking for a summary of `input`.
    pub fn summarize(&self, input: &EmailInput) -> Result<Vec<Message>, RenderError> {
        self.build(Task::Summarize, input)
    }

    /// System and user messages asking for a reply to `input`, guided
    /// by `input.summary` when one was computed already.
    pub fn draft_reply(&self, input: &EmailInput) -> Result<Vec<Message>, RenderError> {
        self.build(Task::DraftReply, input)
    }

    pub fn build(&self, task: Task, input: &EmailInput) -> Result<Vec<Message>, RenderError> {
        let system = self.templates.render(
            &Prompt::System.to_string(),
            &json!({
                "role": self.config.role,
                "prompt_version": self.config.prompt_version
            }),
        )?;

        let mut blocks = self.common_blocks(task, &input.options)?;
        if task == Task::DraftReply
            && let Some(summary) = &input.summary
        {
            blocks.push(self.summary_block(summary)?);
        }
        blocks.push(self.email_block(input)?);
        blocks.push(String::from("Now perform the task as instructed above."));

        Ok(vec![
            Message::new(Role::System, &system),
            Message::new(Role::User, &blocks.join("\n\n")),
        ])
    }

    fn common_blocks(&self, task: Task, options: &DraftOptions) -> Result<Vec<String>, RenderError> {
        let config = &self.config;

        let mut rules = vec![
            format!("Language: {}", options.language),
            format!("Tone: {}", options.tone),
            format!("Style: {}", options.style),
            format!("Max summary bullets: {}", options.max_summary_bullets),
            if options.include_action_items {
                String::from("Include action items if explicit or strongly implied")
            } else {
                String::from("Do not include action items")
            },
            String::from("Do not include quoted original text in replies"),
        ];
        rules.extend(config.output_constraints.iter().cloned());

        let instruction = config
            .instruction
            .clone()
            .unwrap_or_else(|| task.default_instruction());
        let output_format = config
            .output_format
            .clone()
            .unwrap_or_else(|| task.default_output_format(options));

        let sections = [
            ("Your task is as follows:", None, instruction),
            ("Ensure your response follows these rules:", None, rules),
            (
                "Follow these style and tone guidelines in your response:",
                None,
                config.style_or_tone.clone(),
            ),
            ("Structure your response as follows:", None, output_format),
            (
                "Here’s some background that may help you:",
                config.context.clone(),
                Vec::new(),
            ),
            (
                "Here are some examples to guide your response:",
                None,
                config.examples.clone(),
            ),
        ];

        let mut blocks = Vec::new();
        for (label, text, items) in sections {
            if let Some(block) = self.section(label, text, &items)? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    fn section(
        &self,
        label: &str,
        text: Option<String>,
        items: &[String],
    ) -> Result<Option<String>, RenderError> {
        let text = text.filter(|t| !t.trim().is_empty());
        if text.is_none() && items.is_empty() {
            return Ok(None);
        }
        let rendered = self.templates.render(
            &Prompt::Section.to_string(),
            &json!({"label": label, "text": text, "items": items}),
        )?;
        Ok(Some(rendered.trim().to_string()))
    }

    fn summary_block(&self, summary: &EmailSummary) -> Result<String, RenderError> {
        let items = vec![
            format!("gist: {}", summary.gist),
            format!("bullets: {}", summary.bullets.join("; ")),
            format!("actionItems: {}", summary.action_items.join("; ")),
            format!("sentiment: {}", summary.sentiment),
        ];
        let block = self.section("Precomputed summary:", None, &items)?;
        Ok(block.unwrap_or_default())
    }

    fn email_block(&self, input: &EmailInput) -> Result<String, RenderError> {
        let rendered = self.templates.render(
            &Prompt::Email.to_string(),
            &json!({
                "subject": input.subject.as_deref().unwrap_or("(none)"),
                "thread_context": input.thread_context,
                "body": input.body
            }),
        )?;
        // Only the template's own leading and trailing newlines go, the
        // body stays verbatim
        Ok(rendered
            .strip_prefix('\n')
            .unwrap_or(&rendered)
            .trim_end_matches('\n')
            .to_string())
    }
}

/// Appends `text` as a new paragraph of the last user message.
pub fn append_to_user_message(messages: &mut [Message], text: &str) {
    if let Some(msg) = messages.iter_mut().rev().find(|m| m.role == Role::User) {
        msg.content = format!("{}\n\n{}", msg.content, text);
    }
}
