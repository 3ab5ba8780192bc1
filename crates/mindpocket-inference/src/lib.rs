//! # mindpocket-inference
//!
//! Model backends for MindPocket.
//!
//! This crate provides:
//! - An OpenAI-compatible backend implementing [`EmbeddingBackend`] and
//!   [`ToolChatBackend`] (feature `openai`, on by default)
//! - A scripted mock backend for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use mindpocket_inference::OpenAIBackend;
//! use mindpocket_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::from_env().unwrap();
//!     let texts = vec!["Hello".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use mindpocket_core::*;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockInferenceBackend;
