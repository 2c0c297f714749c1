use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use serde_json::{Value, json};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ai::normalize::{DRAFT_REPLY_KEY, SUMMARY_KEY};
use crate::ai::{EmailAssistant, build_model};
use crate::core::{AppConfig, Provider};
use crate::email::{DraftOptions, EmailInput, Style, Tone};

/// What to produce for the email.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Only the summary
    Summarize,
    /// Only the reply draft
    Draft,
    /// Summary first, then a reply draft guided by it
    #[default]
    Both,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Summarize an email and draft a reply with an LLM", long_about = None)]
pub struct Cli {
    /// Subject line of the email. Pass "" if there is none
    pub subject: String,

    /// File containing the email body
    pub body_file: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Both)]
    pub mode: Mode,

    #[arg(long, value_enum)]
    pub tone: Option<Tone>,

    #[arg(long, value_enum)]
    pub style: Option<Style>,

    /// Language to write in, e.g. "en" or "de"
    #[arg(long)]
    pub language: Option<String>,

    /// Maximum number of summary bullets
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_bullets: Option<u64>,

    /// Leave action items out of the summary
    #[arg(long, action, default_value = "false")]
    pub no_action_items: bool,

    /// File with a prior message of the thread. Repeat oldest first
    #[arg(long = "thread", value_name = "FILE")]
    pub thread: Vec<PathBuf>,

    /// Overrides MODEL_PROVIDER
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Overrides the model of the selected provider
    #[arg(long)]
    pub model: Option<String>,

    /// Skip schema constrained output and always prompt for JSON
    #[arg(long, action, default_value = "false")]
    pub no_structured: bool,
}

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("could not read {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn read_file(path: &Path) -> Result<String, UsageError> {
    fs::read_to_string(path).map_err(|source| UsageError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    })
}

impl Cli {
    pub fn draft_options(&self) -> DraftOptions {
        let defaults = DraftOptions::default();
        DraftOptions {
            language: self.language.clone().unwrap_or(defaults.language),
            tone: self.tone.unwrap_or(defaults.tone),
            style: self.style.unwrap_or(defaults.style),
            max_summary_bullets: self
                .max_bullets
                .map(|n| n as usize)
                .unwrap_or(defaults.max_summary_bullets),
            include_action_items: !self.no_action_items,
        }
    }

    /// Reads the body and thread files into an email. An empty subject
    /// means the email has none.
    pub fn read_email_input(&self) -> Result<EmailInput, UsageError> {
        let body = read_file(&self.body_file)?;
        let thread_context = self
            .thread
            .iter()
            .map(|path| read_file(path).map(|s| s.trim().to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut input = EmailInput::new(&body)
            .thread_context(thread_context)
            .options(self.draft_options());
        let subject = self.subject.trim();
        if !subject.is_empty() {
            input = input.subject(subject);
        }
        Ok(input)
    }

    /// Applies the provider and model flags on top of the environment.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(model) = &self.model {
            config.set_model(model);
        }
        if self.no_structured {
            config.structured_output = false;
        }
    }
}

pub async fn run_mode(assistant: &EmailAssistant, mode: Mode, input: &EmailInput) -> Result<Value> {
    let output = match mode {
        Mode::Summarize => {
            let summary = assistant.summarize_email(input).await?;
            json!({ SUMMARY_KEY: summary })
        }
        Mode::Draft => {
            let reply = assistant.draft_reply(input).await?;
            json!({ DRAFT_REPLY_KEY: reply })
        }
        Mode::Both => serde_json::to_value(assistant.summarize_and_draft(input).await?)?,
    };
    Ok(output)
}

async fn execute(args: Cli) -> Result<String> {
    let input = args.read_email_input()?;

    let mut config = AppConfig::from_env()?;
    args.apply_overrides(&mut config);

    let assistant = EmailAssistant::new(build_model(&config)?);
    tracing::info!("Running {:?} with {}", args.mode, config.model());
    let output = run_mode(&assistant, args.mode, &input).await?;

    Ok(serde_json::to_string_pretty(&output)?)
}

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Exit status for an error that ended the run. Bad arguments are a
/// usage error, anything else is a plain failure.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<UsageError>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_FAILURE
    }
}

/// Entry point for the binary. Returns the process exit code.
pub async fn run() -> i32 {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout is only the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return e.exit_code();
        }
    };

    match execute(args).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            match e.downcast_ref::<UsageError>() {
                Some(usage) => {
                    eprintln!("error: {}\n\n{}", usage, Cli::command().render_usage())
                }
                None => eprintln!("Error: {:#}", e),
            }
            exit_code(&e)
        }
    }
}
