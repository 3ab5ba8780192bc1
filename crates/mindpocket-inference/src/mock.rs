//! Mock inference backend for deterministic testing.
//!
//! Embeddings are derived from the text so identical inputs always produce
//! identical vectors. Chat replies are scripted: each `chat` call pops the
//! next queued [`ChatReply`], and every call is logged for assertions.
//!
//! ```rust,ignore
//! use mindpocket_inference::mock::MockInferenceBackend;
//! use mindpocket_core::{ChatReply, ChatTurn, ToolChatBackend};
//!
//! let backend = MockInferenceBackend::new()
//!     .with_reply(ChatReply { content: Some("NONE".into()), tool_calls: vec![] });
//! let reply = backend.chat(&[ChatTurn::User("hi".into())], &[]).await.unwrap();
//! assert_eq!(reply.content.as_deref(), Some("NONE"));
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mindpocket_core::{
    ChatReply, ChatTurn, EmbeddingBackend, Error, Result, ToolCall, ToolChatBackend, ToolSpec,
    Vector,
};

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    fail_embeddings: bool,
    fail_chat: bool,
    latency_ms: u64,
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<ChatReply>,
    calls: Vec<MockCall>,
}

/// One recorded backend invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 8,
            fail_embeddings: false,
            fail_chat: false,
            latency_ms: 0,
        }
    }
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Make every `embed_texts` call fail.
    pub fn with_embedding_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_embeddings = true;
        self
    }

    /// Make every `chat` call fail.
    pub fn with_chat_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_chat = true;
        self
    }

    /// Delay every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Queue a scripted chat reply.
    pub fn with_reply(self, reply: ChatReply) -> Self {
        self.push_reply(reply);
        self
    }

    /// Queue a reply that only carries text.
    pub fn with_text_reply(self, text: impl Into<String>) -> Self {
        self.with_reply(ChatReply {
            content: Some(text.into()),
            tool_calls: Vec::new(),
        })
    }

    /// Queue a reply that requests one tool call.
    pub fn with_tool_call(
        self,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        self.with_reply(ChatReply {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
        })
    }

    /// Queue a scripted chat reply on a shared backend.
    pub fn push_reply(&self, reply: ChatReply) {
        if let Ok(mut state) = self.state.lock() {
            state.replies.push_back(reply);
        }
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Get number of embed calls.
    pub fn embed_call_count(&self) -> usize {
        self.count("embed")
    }

    /// Get number of chat calls.
    pub fn chat_call_count(&self) -> usize {
        self.count("chat")
    }

    fn count(&self, operation: &str) -> usize {
        self.get_calls()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn log_call(&self, operation: &str, input: String) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.push(MockCall {
                operation: operation.to_string(),
                input,
            });
        }
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    /// Deterministic unit vector derived from the characters of `text`.
    pub fn embedding_for(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0_f32; dimension.max(1)];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % vec.len();
            vec[idx] += 0.1;
        }
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
        vec
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.log_call("embed", texts.join("\n"));
        self.simulate_latency().await;

        if self.config.fail_embeddings {
            return Err(Error::Embedding("Simulated failure for testing".to_string()));
        }

        Ok(texts
            .iter()
            .map(|t| Vector::from(Self::embedding_for(t, self.config.dimension)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl ToolChatBackend for MockInferenceBackend {
    async fn chat(&self, messages: &[ChatTurn], _tools: &[ToolSpec]) -> Result<ChatReply> {
        let last = match messages.last() {
            Some(ChatTurn::User(text)) | Some(ChatTurn::System(text)) => text.clone(),
            Some(ChatTurn::Tool { content, .. }) => content.clone(),
            Some(ChatTurn::Assistant { content, .. }) => content.clone().unwrap_or_default(),
            None => String::new(),
        };
        self.log_call("chat", last);
        self.simulate_latency().await;

        if self.config.fail_chat {
            return Err(Error::Inference("Simulated failure for testing".to_string()));
        }

        let reply = self
            .state
            .lock()
            .map_err(|_| Error::Internal("mock state poisoned".to_string()))?
            .replies
            .pop_front();
        Ok(reply.unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let backend = MockInferenceBackend::new().with_dimension(16);
        let texts = vec!["quantum computing".to_string(), "quantum computing".to_string()];

        let vectors = backend.embed_texts(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].as_slice(), vectors[1].as_slice());
        assert_eq!(vectors[0].as_slice().len(), 16);
        assert_eq!(backend.embed_call_count(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure() {
        let backend = MockInferenceBackend::new().with_embedding_failure();
        let err = backend.embed_texts(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let backend = MockInferenceBackend::new()
            .with_tool_call("c1", "listFolders", serde_json::json!({}))
            .with_text_reply("NONE");

        let turns = vec![ChatTurn::User("classify".to_string())];
        let first = backend.chat(&turns, &[]).await.unwrap();
        assert_eq!(first.tool_calls[0].name, "listFolders");

        let second = backend.chat(&turns, &[]).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("NONE"));

        // Exhausted script yields an empty reply.
        let third = backend.chat(&turns, &[]).await.unwrap();
        assert_eq!(third, ChatReply::default());
        assert_eq!(backend.chat_call_count(), 3);
    }

    #[tokio::test]
    async fn test_latency_simulation() {
        let backend = MockInferenceBackend::new().with_latency_ms(20);
        let start = std::time::Instant::now();
        backend.embed_texts(&["x".to_string()]).await.unwrap();
        assert!(start.elapsed().as_millis() >= 20);
    }
}
