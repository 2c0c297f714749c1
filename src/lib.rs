pub mod ai;
pub mod cli;
pub mod core;
pub mod email;
pub mod google;
pub mod ollama;
pub mod openai;
