pub mod models;

pub use models::{
    DraftOptions, EmailInput, EmailSummary, Sentiment, Style, SuggestedReply,
    SummarizeAndDraftOutput, Tone,
};
