use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    /// The schema enforced attempt failed. The assistant recovers from
    /// this by asking for JSON in the prompt instead, so callers never
    /// see it.
    #[error("structured output failed: {0}")]
    StructuredOutput(#[source] anyhow::Error),

    /// The prompted JSON fallback returned something that isn't JSON.
    #[error("model output is not valid JSON ({source}): {content}")]
    MalformedModelOutput {
        content: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model request failed: {0}")]
    Model(#[source] anyhow::Error),

    #[error("failed to render prompt: {0}")]
    Prompt(#[from] handlebars::RenderError),
}
