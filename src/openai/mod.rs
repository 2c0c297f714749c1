pub mod core;

pub use core::OpenAiClient;
