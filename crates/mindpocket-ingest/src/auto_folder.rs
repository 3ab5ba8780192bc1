//! Model-driven folder assignment for new ingests.
//!
//! The resolver runs a bounded tool-calling loop against the user's default
//! chat provider. The model lists folders, optionally creates one, and ends
//! with `FOLDER_ID:<id>` or `NONE`. Resolution is best-effort: every failure
//! is logged and resolves to no assignment.

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use mindpocket_core::defaults::AUTO_FOLDER_MAX_STEPS;
use mindpocket_core::{
    ChatProvider, ChatProviderRepository, ChatTurn, FolderAssignmentDecision, FolderRepository,
    Result, SourceType, ToolChatBackend,
};
use mindpocket_inference::OpenAIBackend;

use crate::folder_tools::{FolderTools, CREATE_FOLDER};

static FOLDER_ID_DECISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^FOLDER_ID:\s*([A-Za-z0-9_-]+)\s*$").expect("valid decision regex")
});
static NONE_DECISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^NONE$").expect("valid decision regex"));

const SYSTEM_PROMPT: &str = "You file a user's saved content into one of their folders.\n\
Always call listFolders first.\n\
Prefer an existing folder whose topic fits the content.\n\
Call createFolder only when no existing folder fits.\n\
When done, reply with exactly FOLDER_ID:<id> or NONE and nothing else.";

/// Builds a chat backend for a provider record.
pub type ChatBackendFactory =
    Arc<dyn Fn(&ChatProvider) -> Result<Arc<dyn ToolChatBackend>> + Send + Sync>;

/// Parse the model's final answer.
///
/// Returns `None` when the text matches neither accepted form.
pub fn parse_decision(text: &str) -> Option<FolderAssignmentDecision> {
    let text = text.trim();
    if let Some(caps) = FOLDER_ID_DECISION.captures(text) {
        return Some(FolderAssignmentDecision::Assign(caps[1].to_string()));
    }
    if NONE_DECISION.is_match(text) {
        return Some(FolderAssignmentDecision::NoAssignment);
    }
    None
}

/// Facts about the ingested item shown to the model.
#[derive(Debug, Clone)]
pub struct FolderResolveRequest {
    pub user_id: String,
    pub source_type: SourceType,
    pub url: Option<String>,
    pub title: Option<String>,
    pub file_name: Option<String>,
}

impl FolderResolveRequest {
    fn prompt(&self) -> String {
        let field = |v: &Option<String>| v.as_deref().unwrap_or("-").to_string();
        format!(
            "Pick a folder for this item.\nsourceType: {}\nurl: {}\ntitle: {}\nfileName: {}",
            self.source_type,
            field(&self.url),
            field(&self.title),
            field(&self.file_name)
        )
    }
}

pub struct AutoFolderResolver {
    providers: Arc<dyn ChatProviderRepository>,
    folders: Arc<dyn FolderRepository>,
    backend_factory: ChatBackendFactory,
    max_steps: usize,
}

impl AutoFolderResolver {
    /// Resolver using OpenAI-compatible backends built from provider records.
    pub fn new(providers: Arc<dyn ChatProviderRepository>, folders: Arc<dyn FolderRepository>) -> Self {
        let factory: ChatBackendFactory = Arc::new(|provider: &ChatProvider| {
            let backend: Arc<dyn ToolChatBackend> = Arc::new(OpenAIBackend::from_provider(provider)?);
            Ok(backend)
        });
        Self {
            providers,
            folders,
            backend_factory: factory,
            max_steps: AUTO_FOLDER_MAX_STEPS,
        }
    }

    pub fn with_backend_factory(mut self, factory: ChatBackendFactory) -> Self {
        self.backend_factory = factory;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn folders(&self) -> &Arc<dyn FolderRepository> {
        &self.folders
    }

    /// Pick a folder id for the item, or `None`. Never fails.
    pub async fn resolve(&self, request: &FolderResolveRequest) -> Option<String> {
        let start = Instant::now();
        match self.try_resolve(request).await {
            Ok(folder_id) => {
                info!(
                    subsystem = "ingest",
                    component = "auto_folder",
                    op = "resolve",
                    user_id = %request.user_id,
                    folder_id = ?folder_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Folder resolution finished"
                );
                folder_id
            }
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "auto_folder",
                    op = "resolve",
                    user_id = %request.user_id,
                    source_type = %request.source_type,
                    url = ?request.url,
                    title = ?request.title,
                    file_name = ?request.file_name,
                    error = %e,
                    "Folder resolution failed"
                );
                None
            }
        }
    }

    async fn try_resolve(&self, request: &FolderResolveRequest) -> Result<Option<String>> {
        let Some(provider) = self.providers.default_chat_provider(&request.user_id).await? else {
            debug!(
                subsystem = "ingest",
                component = "auto_folder",
                user_id = %request.user_id,
                "No default chat provider, skipping"
            );
            return Ok(None);
        };

        let backend = (self.backend_factory)(&provider)?;
        let tools = FolderTools::new(self.folders.clone(), request.user_id.clone());
        let specs = FolderTools::specs();

        let mut messages = vec![
            ChatTurn::System(SYSTEM_PROMPT.to_string()),
            ChatTurn::User(request.prompt()),
        ];
        let mut tool_results: Vec<(String, JsonValue)> = Vec::new();
        let mut final_text = None;

        for step in 0..self.max_steps {
            let reply = backend.chat(&messages, &specs).await?;
            if reply.tool_calls.is_empty() {
                final_text = reply.content;
                break;
            }

            debug!(
                subsystem = "ingest",
                component = "auto_folder",
                step,
                tool_calls = reply.tool_calls.len(),
                "Model requested tools"
            );
            messages.push(ChatTurn::Assistant {
                content: reply.content.clone(),
                tool_calls: reply.tool_calls.clone(),
            });
            for call in &reply.tool_calls {
                let result = tools.execute(call).await;
                messages.push(ChatTurn::Tool {
                    call_id: call.id.clone(),
                    content: result.to_string(),
                });
                tool_results.push((call.name.clone(), result));
            }
        }

        match final_text.as_deref().and_then(parse_decision) {
            Some(FolderAssignmentDecision::Assign(id)) => Ok(Some(id)),
            Some(FolderAssignmentDecision::NoAssignment) => Ok(None),
            None => Ok(created_folder_id(&tool_results)),
        }
    }
}

/// Id of the most recent successful `createFolder` call.
fn created_folder_id(results: &[(String, JsonValue)]) -> Option<String> {
    results.iter().rev().find_map(|(name, result)| {
        if name != CREATE_FOLDER || result["success"] != JsonValue::Bool(true) {
            return None;
        }
        result["data"]["folder"]["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindpocket_core::{ChatReply, Folder, NewFolder, ToolCall};
    use mindpocket_db::memory::MemoryStore;
    use mindpocket_inference::MockInferenceBackend;
    use serde_json::json;
    use uuid::Uuid;

    fn request() -> FolderResolveRequest {
        FolderResolveRequest {
            user_id: "u1".to_string(),
            source_type: SourceType::Url,
            url: Some("https://blog.rust-lang.org/".to_string()),
            title: Some("Rust blog".to_string()),
            file_name: None,
        }
    }

    async fn store_with_provider() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .add_chat_provider(ChatProvider {
                id: Uuid::now_v7(),
                user_id: "u1".to_string(),
                base_url: "http://unused.invalid/v1".to_string(),
                api_key: None,
                model: "gpt-test".to_string(),
            })
            .await;
        store
    }

    async fn folder(store: &MemoryStore, name: &str) -> Folder {
        store
            .create(NewFolder {
                user_id: "u1".to_string(),
                name: name.to_string(),
                description: None,
                emoji: "📁".to_string(),
            })
            .await
            .unwrap()
    }

    fn resolver(store: &Arc<MemoryStore>, mock: &MockInferenceBackend) -> AutoFolderResolver {
        let mock = mock.clone();
        AutoFolderResolver::new(store.clone(), store.clone()).with_backend_factory(Arc::new(
            move |_provider: &ChatProvider| {
                let backend: Arc<dyn ToolChatBackend> = Arc::new(mock.clone());
                Ok(backend)
            },
        ))
    }

    #[test]
    fn test_parse_decision() {
        assert_eq!(
            parse_decision("FOLDER_ID:abc-123"),
            Some(FolderAssignmentDecision::Assign("abc-123".into()))
        );
        assert_eq!(
            parse_decision("  folder_id:  x_Y \n"),
            Some(FolderAssignmentDecision::Assign("x_Y".into()))
        );
        assert_eq!(parse_decision("none"), Some(FolderAssignmentDecision::NoAssignment));
        assert_eq!(parse_decision("FOLDER_ID: a b"), None);
        assert_eq!(parse_decision("I picked FOLDER_ID:abc"), None);
        assert_eq!(parse_decision("None of these"), None);
    }

    #[tokio::test]
    async fn test_assigns_existing_folder() {
        let store = store_with_provider().await;
        let existing = folder(&store, "Programming").await;
        let mock = MockInferenceBackend::new()
            .with_tool_call("c1", "listFolders", json!({}))
            .with_text_reply(format!("FOLDER_ID:{}", existing.id));

        let result = resolver(&store, &mock).resolve(&request()).await;
        assert_eq!(result, Some(existing.id.to_string()));
        assert_eq!(mock.chat_call_count(), 2);
    }

    #[tokio::test]
    async fn test_unrecognized_answer_falls_back_to_created_folder() {
        let store = store_with_provider().await;
        let mock = MockInferenceBackend::new()
            .with_tool_call("c1", "listFolders", json!({}))
            .with_tool_call("c2", "createFolder", json!({ "name": "Rust" }))
            .with_text_reply("Filed it under the new Rust folder.");

        let result = resolver(&store, &mock).resolve(&request()).await.unwrap();
        let folders = FolderRepository::list(store.as_ref(), "u1").await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(result, folders[0].id.to_string());
    }

    #[tokio::test]
    async fn test_explicit_none() {
        let store = store_with_provider().await;
        let mock = MockInferenceBackend::new()
            .with_tool_call("c1", "createFolder", json!({ "name": "Misc" }))
            .with_text_reply("NONE");
        assert_eq!(resolver(&store, &mock).resolve(&request()).await, None);
    }

    #[tokio::test]
    async fn test_no_provider_skips_model() {
        let store = Arc::new(MemoryStore::new());
        let mock = MockInferenceBackend::new().with_text_reply("FOLDER_ID:x");
        assert_eq!(resolver(&store, &mock).resolve(&request()).await, None);
        assert_eq!(mock.chat_call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_error_resolves_to_none() {
        let store = store_with_provider().await;
        let mock = MockInferenceBackend::new().with_chat_failure();
        assert_eq!(resolver(&store, &mock).resolve(&request()).await, None);
    }

    #[tokio::test]
    async fn test_step_budget_is_enforced() {
        let store = store_with_provider().await;
        let mock = MockInferenceBackend::new();
        for i in 0..10 {
            mock.push_reply(ChatReply {
                content: None,
                tool_calls: vec![ToolCall {
                    id: format!("c{}", i),
                    name: "listFolders".to_string(),
                    arguments: json!({}),
                }],
            });
        }

        let result = resolver(&store, &mock)
            .with_max_steps(4)
            .resolve(&request())
            .await;
        assert_eq!(result, None);
        assert_eq!(mock.chat_call_count(), 4);
    }

    #[test]
    fn test_created_folder_id_scans_latest_success() {
        let results = vec![
            (
                CREATE_FOLDER.to_string(),
                json!({ "success": true, "data": { "folder": { "id": "first" } } }),
            ),
            (
                CREATE_FOLDER.to_string(),
                json!({ "success": true, "data": { "folder": { "id": "second" } } }),
            ),
            (
                CREATE_FOLDER.to_string(),
                json!({ "success": false, "error": "folder_name_required" }),
            ),
            ("listFolders".to_string(), json!({ "success": true, "data": { "folders": [] } })),
        ];
        assert_eq!(created_folder_id(&results), Some("second".to_string()));
        assert_eq!(created_folder_id(&results[2..]), None);
    }

    #[test]
    fn test_prompt_lists_fields() {
        let prompt = request().prompt();
        assert!(prompt.contains("sourceType: url"));
        assert!(prompt.contains("url: https://blog.rust-lang.org/"));
        assert!(prompt.contains("fileName: -"));
    }
}
