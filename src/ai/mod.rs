pub mod assistant;
pub mod error;
pub mod model;
pub mod normalize;
pub mod prompt;
pub mod provider;

pub use assistant::EmailAssistant;
pub use error::AssistantError;
pub use model::{
    BoxedModelClient, Message, ModelClient, ModelResponse, OutputSchema, Role, StructuredInvoke,
};
pub use prompt::{PromptBuilder, PromptConfig};
pub use provider::build_model;
