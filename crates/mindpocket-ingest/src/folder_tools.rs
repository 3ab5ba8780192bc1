//! Folder tools exposed to the model during auto-folder resolution.
//!
//! Results are JSON envelopes, `{success: true, data}` or
//! `{success: false, error}`, so the model can read failures and recover.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::trace;

use mindpocket_core::defaults::{DEFAULT_FOLDER_EMOJI, FOLDER_DESCRIPTION_MAX_CHARS};
use mindpocket_core::{truncate_chars, FolderRepository, NewFolder, ToolCall, ToolSpec};

pub const LIST_FOLDERS: &str = "listFolders";
pub const CREATE_FOLDER: &str = "createFolder";

#[derive(Debug, Default, Deserialize)]
struct CreateFolderArgs {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    emoji: Option<String>,
}

fn failure(error: impl Into<String>) -> JsonValue {
    json!({ "success": false, "error": error.into() })
}

/// Folder operations scoped to one user.
pub struct FolderTools {
    folders: Arc<dyn FolderRepository>,
    user_id: String,
}

impl FolderTools {
    pub fn new(folders: Arc<dyn FolderRepository>, user_id: impl Into<String>) -> Self {
        Self {
            folders,
            user_id: user_id.into(),
        }
    }

    /// Function definitions offered to the model.
    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: LIST_FOLDERS.to_string(),
                description: "List the user's existing folders with their ids, names, descriptions and emojis."
                    .to_string(),
                parameters: json!({ "type": "object", "properties": {} }),
            },
            ToolSpec {
                name: CREATE_FOLDER.to_string(),
                description: "Create a new folder. Only use when no existing folder fits. \
                              Returns the existing folder if one with the same name exists."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Folder name" },
                        "description": { "type": "string", "description": "Short description of what belongs in the folder" },
                        "emoji": { "type": "string", "description": "A single emoji for the folder" }
                    },
                    "required": ["name"]
                }),
            },
        ]
    }

    /// Run a tool call and return its JSON result.
    pub async fn execute(&self, call: &ToolCall) -> JsonValue {
        trace!(
            subsystem = "ingest",
            component = "auto_folder",
            tool = %call.name,
            "Executing tool call"
        );
        match call.name.as_str() {
            LIST_FOLDERS => self.list_folders().await,
            CREATE_FOLDER => match serde_json::from_value::<CreateFolderArgs>(call.arguments.clone()) {
                Ok(args) => self.create_folder(args).await,
                Err(e) => failure(format!("invalid_arguments: {}", e)),
            },
            other => failure(format!("unknown_tool: {}", other)),
        }
    }

    pub async fn list_folders(&self) -> JsonValue {
        match self.folders.list(&self.user_id).await {
            Ok(folders) => json!({ "success": true, "data": { "folders": folders } }),
            Err(e) => failure(e.to_string()),
        }
    }

    async fn create_folder(&self, args: CreateFolderArgs) -> JsonValue {
        let name = args.name.unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return failure("folder_name_required");
        }

        let existing = match self.folders.list(&self.user_id).await {
            Ok(folders) => folders,
            Err(e) => return failure(e.to_string()),
        };
        let wanted = name.to_lowercase();
        if let Some(folder) = existing
            .into_iter()
            .find(|f| f.name.trim().to_lowercase() == wanted)
        {
            return json!({ "success": true, "data": { "folder": folder } });
        }

        let description = args
            .description
            .map(|d| truncate_chars(d.trim(), FOLDER_DESCRIPTION_MAX_CHARS).trim().to_string())
            .filter(|d| !d.is_empty());
        let emoji = args
            .emoji
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_FOLDER_EMOJI.to_string());

        let new = NewFolder {
            user_id: self.user_id.clone(),
            name,
            description,
            emoji,
        };
        match self.folders.create(new).await {
            Ok(folder) => json!({ "success": true, "data": { "folder": folder } }),
            Err(e) => failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindpocket_db::memory::MemoryStore;

    fn call(name: &str, arguments: JsonValue) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    fn tools(store: &Arc<MemoryStore>, user: &str) -> FolderTools {
        FolderTools::new(store.clone(), user)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = Arc::new(MemoryStore::new());
        let tools = tools(&store, "u1");

        let created = tools
            .execute(&call(
                CREATE_FOLDER,
                json!({ "name": "  Reading  ", "description": "  Articles to read ", "emoji": " 📚 " }),
            ))
            .await;
        assert_eq!(created["success"], true);
        let folder = &created["data"]["folder"];
        assert_eq!(folder["name"], "Reading");
        assert_eq!(folder["description"], "Articles to read");
        assert_eq!(folder["emoji"], "📚");
        assert_eq!(folder["sortOrder"], 0);

        let second = tools
            .execute(&call(CREATE_FOLDER, json!({ "name": "Recipes" })))
            .await;
        assert_eq!(second["data"]["folder"]["emoji"], DEFAULT_FOLDER_EMOJI);
        assert_eq!(second["data"]["folder"]["sortOrder"], 1);
        assert!(second["data"]["folder"]["description"].is_null());

        let listed = tools.execute(&call(LIST_FOLDERS, json!({}))).await;
        let names: Vec<&str> = listed["data"]["folders"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Reading", "Recipes"]);
    }

    #[tokio::test]
    async fn test_duplicate_name_returns_existing() {
        let store = Arc::new(MemoryStore::new());
        let tools = tools(&store, "u1");

        let first = tools.execute(&call(CREATE_FOLDER, json!({ "name": "Rust" }))).await;
        let again = tools.execute(&call(CREATE_FOLDER, json!({ "name": " rust " }))).await;
        assert_eq!(first["data"]["folder"]["id"], again["data"]["folder"]["id"]);

        let listed = tools.list_folders().await;
        assert_eq!(listed["data"]["folders"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let store = Arc::new(MemoryStore::new());
        let tools = tools(&store, "u1");

        let blank = tools.execute(&call(CREATE_FOLDER, json!({ "name": "   " }))).await;
        assert_eq!(blank, json!({ "success": false, "error": "folder_name_required" }));

        let malformed = tools
            .execute(&call(CREATE_FOLDER, JsonValue::String("{not json".into())))
            .await;
        assert_eq!(malformed["success"], false);

        let unknown = tools.execute(&call("deleteFolder", json!({}))).await;
        assert_eq!(unknown["error"], "unknown_tool: deleteFolder");
    }

    #[tokio::test]
    async fn test_description_truncated() {
        let store = Arc::new(MemoryStore::new());
        let tools = tools(&store, "u1");
        let long = "d".repeat(500);
        let created = tools
            .execute(&call(CREATE_FOLDER, json!({ "name": "Long", "description": long })))
            .await;
        assert_eq!(
            created["data"]["folder"]["description"]
                .as_str()
                .unwrap()
                .chars()
                .count(),
            200
        );
    }

    #[tokio::test]
    async fn test_folders_are_per_user() {
        let store = Arc::new(MemoryStore::new());
        tools(&store, "u1")
            .execute(&call(CREATE_FOLDER, json!({ "name": "Mine" })))
            .await;
        let other = tools(&store, "u2").list_folders().await;
        assert!(other["data"]["folders"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_specs() {
        let specs = FolderTools::specs();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![LIST_FOLDERS, CREATE_FOLDER]);
        assert_eq!(specs[1].parameters["required"], json!(["name"]));
    }
}
