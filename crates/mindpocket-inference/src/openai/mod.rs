//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint speaking the OpenAI chat completions and
//! embeddings APIs, including OpenAI itself, OpenRouter, Ollama in
//! compatibility mode, vLLM and LM Studio. Chat requests carry function
//! definitions so the model can call tools.
//!
//! # Example
//!
//! ```rust,no_run
//! use mindpocket_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use mindpocket_core::{ChatTurn, ToolChatBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         gen_model: "llama3.1".to_string(),
//!         ..Default::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!
//!     let turns = vec![ChatTurn::User("Say hi".to_string())];
//!     let reply = backend.chat(&turns, &[]).await.unwrap();
//!     println!("{:?}", reply.content);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_DIMENSION, DEFAULT_EMBED_MODEL, DEFAULT_GEN_MODEL,
    DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_mindpocket_error, OpenAIErrorCode};
pub use types::*;
