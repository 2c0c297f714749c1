use std::env;

use anyhow::{Result, anyhow};
use clap::ValueEnum;

pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:0.5b";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_OPENAI_HOST: &str = "https://api.openai.com";

/// Which LLM backend to talk to.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    /// Local inference through Ollama
    #[default]
    Ollama,
    /// Google Gemini
    Gemini,
    /// Any OpenAI compatible chat completions API
    Openai,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub provider: Provider,
    pub ollama_model: String,
    pub ollama_host: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_hostname: String,
    /// Ask the model for schema constrained output before falling back
    /// to JSON in the prompt.
    pub structured_output: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_api_hostname: DEFAULT_OPENAI_HOST.to_string(),
            structured_output: true,
        }
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source. Unset or
    /// empty variables fall back to the defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let provider = match var("MODEL_PROVIDER") {
            Some(name) => Provider::from_str(name.trim(), true)
                .map_err(|_| anyhow!("Unknown MODEL_PROVIDER: {}", name))?,
            None => defaults.provider,
        };

        let structured_output = match var("MODEL_STRUCTURED_OUTPUT") {
            Some(flag) => parse_flag(&flag)
                .ok_or_else(|| anyhow!("Invalid MODEL_STRUCTURED_OUTPUT: {}", flag))?,
            None => defaults.structured_output,
        };

        Ok(Self {
            provider,
            ollama_model: var("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            ollama_host: var("OLLAMA_HOST").unwrap_or(defaults.ollama_host),
            gemini_api_key: var("GOOGLE_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_api_hostname: var("OPENAI_API_HOST").unwrap_or(defaults.openai_api_hostname),
            structured_output,
        })
    }

    /// Model name for the selected provider.
    pub fn model(&self) -> &str {
        match self.provider {
            Provider::Ollama => &self.ollama_model,
            Provider::Gemini => &self.gemini_model,
            Provider::Openai => &self.openai_model,
        }
    }

    /// Overrides the model name of the selected provider.
    pub fn set_model(&mut self, model: &str) {
        let slot = match self.provider {
            Provider::Ollama => &mut self.ollama_model,
            Provider::Gemini => &mut self.gemini_model,
            Provider::Openai => &mut self.openai_model,
        };
        *slot = model.to_string();
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
