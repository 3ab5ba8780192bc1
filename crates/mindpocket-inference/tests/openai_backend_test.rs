//! Wire-level tests for the OpenAI-compatible backend.

#![cfg(feature = "openai")]

use mindpocket_core::{ChatTurn, EmbeddingBackend, Error, ToolChatBackend, ToolSpec};
use mindpocket_inference::openai::{OpenAIBackend, OpenAIConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> OpenAIBackend {
    let config = OpenAIConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        embed_model: "test-embed".to_string(),
        gen_model: "test-gen".to_string(),
        embed_dimension: 3,
        timeout_seconds: 10,
    };
    OpenAIBackend::new(config).expect("Failed to create backend")
}

fn list_folders_tool() -> ToolSpec {
    ToolSpec {
        name: "listFolders".to_string(),
        description: "List the user's folders".to_string(),
        parameters: json!({"type": "object", "properties": {}}),
    }
}

#[tokio::test]
async fn test_chat_sends_tools_and_parses_tool_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-gen",
            "tool_choice": "auto",
            "tools": [{"type": "function", "function": {"name": "listFolders"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "listFolders", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let turns = vec![
        ChatTurn::System("Pick a folder".to_string()),
        ChatTurn::User("sourceType: url".to_string()),
    ];
    let reply = backend(&server)
        .chat(&turns, &[list_folders_tool()])
        .await
        .unwrap();

    assert!(reply.content.is_none());
    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].id, "call_1");
    assert_eq!(reply.tool_calls[0].name, "listFolders");
}

#[tokio::test]
async fn test_chat_final_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "FOLDER_ID:abc-123"},
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let reply = backend(&server)
        .chat(&[ChatTurn::User("x".to_string())], &[])
        .await
        .unwrap();

    assert_eq!(reply.content.as_deref(), Some("FOLDER_ID:abc-123"));
    assert!(reply.tool_calls.is_empty());
}

#[tokio::test]
async fn test_chat_auth_error_maps_to_config() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Invalid API key", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .chat(&[ChatTurn::User("x".to_string())], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
    assert!(err.to_string().contains("Invalid API key"));
}

#[tokio::test]
async fn test_embeddings_sorted_by_index() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"embedding": [0.0, 1.0, 0.0], "index": 1},
                {"embedding": [1.0, 0.0, 0.0], "index": 0}
            ],
            "model": "test-embed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = backend(&server)
        .embed_texts(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors[0].as_slice(), &[1.0, 0.0, 0.0]);
    assert_eq!(vectors[1].as_slice(), &[0.0, 1.0, 0.0]);
}

#[tokio::test]
async fn test_embedding_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .embed_texts(&["x".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Embedding(_)));
    assert!(err.to_string().contains("500"));
}
