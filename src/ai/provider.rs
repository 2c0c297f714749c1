use anyhow::{Result, anyhow};

use crate::ai::model::BoxedModelClient;
use crate::core::{AppConfig, Provider};
use crate::google::GeminiClient;
use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;

/// Builds the model client for the configured provider. Hosted
/// providers need an API key.
pub fn build_model(config: &AppConfig) -> Result<BoxedModelClient> {
    let model: BoxedModelClient = match config.provider {
        Provider::Ollama => Box::new(
            OllamaClient::new(&config.ollama_host, &config.ollama_model)
                .structured_output(config.structured_output),
        ),
        Provider::Gemini => {
            let api_key = config
                .gemini_api_key
                .as_deref()
                .ok_or_else(|| anyhow!("GOOGLE_API_KEY must be set to use Gemini"))?;
            Box::new(
                GeminiClient::new(api_key, &config.gemini_model)
                    .structured_output(config.structured_output),
            )
        }
        Provider::Openai => {
            let api_key = config
                .openai_api_key
                .as_deref()
                .ok_or_else(|| anyhow!("OPENAI_API_KEY must be set to use OpenAI"))?;
            Box::new(
                OpenAiClient::new(&config.openai_api_hostname, api_key, &config.openai_model)
                    .structured_output(config.structured_output),
            )
        }
    };
    tracing::debug!(
        "Using {} with model {}",
        model.provider_name(),
        config.model()
    );
    Ok(model)
}
