mod assignments;
pub mod best_times;
mod gemini;
mod openai;
pub mod overviews;
pub mod podcast_script;
pub mod suggestions;
pub mod vibes;

pub use gemini::{GeminiTtsClient, SpeechClient};
pub use openai::{CompletionClient, CompletionRequest, OpenAiClient};
