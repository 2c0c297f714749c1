use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ai::error::AssistantError;
use crate::ai::model::{BoxedModelClient, Message, OutputSchema, StructuredInvoke};
use crate::ai::normalize::{
    DraftReplyEnvelope, SummaryEnvelope, coerce_reply, coerce_summary, draft_reply_schema,
    parse_model_json, summary_schema,
};
use crate::ai::prompt::{PromptBuilder, PromptConfig, Task, append_to_user_message};
use crate::email::{EmailInput, EmailSummary, SuggestedReply, SummarizeAndDraftOutput};

/// Summarizes emails and drafts replies with an LLM.
///
/// Each operation first asks the model for schema enforced output when
/// the model supports it. If that isn't available or fails, the JSON
/// shape is spelled out in the prompt instead and the free text answer
/// is parsed leniently. Only an answer that isn't JSON at all is an
/// error.
///
/// Calls are independent of each other and the assistant keeps no
/// state between them.
pub struct EmailAssistant {
    model: BoxedModelClient,
    prompts: PromptBuilder<'static>,
}

impl EmailAssistant {
    pub fn new(model: BoxedModelClient) -> Self {
        Self {
            model,
            prompts: PromptBuilder::default(),
        }
    }

    pub fn with_prompt_config(mut self, config: PromptConfig) -> Self {
        self.prompts = PromptBuilder::new(config);
        self
    }

    pub async fn summarize_email(&self, input: &EmailInput) -> Result<EmailSummary, AssistantError> {
        tracing::debug!("Summarizing email with {}", self.model.provider_name());
        let messages = self.prompts.summarize(input)?;

        if let Some(envelope) = self
            .structured::<SummaryEnvelope>(&messages, &summary_schema())
            .await
        {
            return Ok(envelope.into());
        }

        let parsed = self.prompted_json(Task::Summarize, messages).await?;
        Ok(coerce_summary(&parsed))
    }

    pub async fn draft_reply(&self, input: &EmailInput) -> Result<SuggestedReply, AssistantError> {
        tracing::debug!("Drafting reply with {}", self.model.provider_name());
        let messages = self.prompts.draft_reply(input)?;

        if let Some(envelope) = self
            .structured::<DraftReplyEnvelope>(&messages, &draft_reply_schema())
            .await
        {
            return Ok(envelope.into());
        }

        let parsed = self.prompted_json(Task::DraftReply, messages).await?;
        Ok(coerce_reply(&parsed, input))
    }

    /// Summarizes the email and then drafts a reply guided by that
    /// summary. The reply depends on the summary so these run one
    /// after the other.
    pub async fn summarize_and_draft(
        &self,
        input: &EmailInput,
    ) -> Result<SummarizeAndDraftOutput, AssistantError> {
        let summary = self.summarize_email(input).await?;
        let with_summary = input.clone().summary(summary.clone());
        let draft_reply = self.draft_reply(&with_summary).await?;
        Ok(SummarizeAndDraftOutput {
            summary,
            draft_reply,
        })
    }

    /// Schema enforced attempt. Any failure here is logged and turned
    /// into `None` so the caller falls through to prompted JSON.
    async fn structured<T: DeserializeOwned>(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Option<T> {
        let client = self.model.structured()?;
        match attempt_structured(client, messages, schema).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    "{} for {} with {}, falling back to JSON prompting",
                    e,
                    schema.name,
                    self.model.provider_name()
                );
                None
            }
        }
    }

    async fn prompted_json(
        &self,
        task: Task,
        mut messages: Vec<Message>,
    ) -> Result<Value, AssistantError> {
        append_to_user_message(&mut messages, task.json_instructions());
        let response = self
            .model
            .invoke(&messages)
            .await
            .map_err(AssistantError::Model)?;
        let content = response.into_content();

        parse_model_json(&content).inspect_err(|e| {
            tracing::error!("Failed to parse model output for {:?}: {}", task, e)
        })
    }
}

async fn attempt_structured<T: DeserializeOwned>(
    client: &dyn StructuredInvoke,
    messages: &[Message],
    schema: &OutputSchema,
) -> Result<T, AssistantError> {
    let value = client
        .invoke_structured(messages, schema)
        .await
        .map_err(AssistantError::StructuredOutput)?;
    serde_json::from_value(value).map_err(|e| AssistantError::StructuredOutput(e.into()))
}
