//! OpenAI API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use mindpocket_core::{ChatTurn, ToolCall, ToolSpec};

// =============================================================================
// EMBEDDING TYPES
// =============================================================================

/// Request body for the embeddings endpoint.
#[derive(Debug, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
}

/// Response from the embeddings endpoint.
#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Single embedding data point.
#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    pub index: usize,
}

// =============================================================================
// CHAT COMPLETION TYPES
// =============================================================================

/// Request body for chat completions endpoint.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stream: bool,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        match turn {
            ChatTurn::System(text) => Self::plain("system", text),
            ChatTurn::User(text) => Self::plain("user", text),
            ChatTurn::Assistant {
                content,
                tool_calls,
            } => Self {
                role: "assistant".to_string(),
                content: content.clone(),
                tool_calls: tool_calls.iter().map(ToolCallPayload::from).collect(),
                tool_call_id: None,
            },
            ChatTurn::Tool { call_id, content } => Self {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(call_id.clone()),
            },
        }
    }
}

/// Function definition exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

/// Tool call as it appears on the wire. `arguments` is a JSON-encoded string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl From<&ToolCall> for ToolCallPayload {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: FunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

impl From<ToolCallPayload> for ToolCall {
    /// Arguments that are not valid JSON are kept as a JSON string so the
    /// tool can report them back to the model.
    fn from(payload: ToolCallPayload) -> Self {
        let raw = payload.function.arguments;
        let arguments = if raw.trim().is_empty() {
            JsonValue::Object(Default::default())
        } else {
            serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw))
        };
        Self {
            id: payload.id,
            name: payload.function.name,
            arguments,
        }
    }
}

/// Response from chat completions endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub choices: Vec<ChatChoice>,
}

/// Single chat completion choice.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub index: usize,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Error response from OpenAI API.
#[derive(Debug, Deserialize)]
pub struct OpenAIErrorResponse {
    pub error: OpenAIError,
}

/// Detailed error information.
#[derive(Debug, Deserialize)]
pub struct OpenAIError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: String,
    pub code: Option<JsonValue>,
}

impl Default for OpenAIErrorResponse {
    fn default() -> Self {
        Self {
            error: OpenAIError {
                message: "Unknown error".to_string(),
                error_type: "unknown".to_string(),
                code: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_omits_empty_tools() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::plain("user", "Hello")],
            tools: vec![],
            tool_choice: None,
            temperature: None,
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["messages"][0].get("tool_calls").is_none());
    }

    #[test]
    fn test_tool_definition_shape() {
        let spec = ToolSpec {
            name: "listFolders".to_string(),
            description: "List folders".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        };

        let json = serde_json::to_value(ToolDefinition::from(&spec)).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "listFolders");
        assert_eq!(json["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_turn_conversion() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "createFolder".to_string(),
            arguments: json!({"name": "Reading"}),
        };
        let assistant = ChatMessage::from(&ChatTurn::Assistant {
            content: None,
            tool_calls: vec![call],
        });
        let json = serde_json::to_value(&assistant).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tool_calls"][0]["function"]["arguments"], r#"{"name":"Reading"}"#);

        let tool = ChatMessage::from(&ChatTurn::Tool {
            call_id: "call_1".to_string(),
            content: "{}".to_string(),
        });
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_response_with_tool_calls() {
        let body = r#"{
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
        }"#;

        let response: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        let message = &response.choices[0].message;
        assert!(message.content.is_none());
        let call = ToolCall::from(message.tool_calls[0].clone());
        assert_eq!(call.name, "listFolders");
        assert_eq!(call.arguments, json!({}));
    }

    #[test]
    fn test_malformed_arguments_kept_as_string() {
        let payload = ToolCallPayload {
            id: "c".to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: "createFolder".to_string(),
                arguments: "{not json".to_string(),
            },
        };
        let call = ToolCall::from(payload);
        assert_eq!(call.arguments, JsonValue::String("{not json".to_string()));
    }

    #[test]
    fn test_openai_error_response_deserialization() {
        let json = r#"{
            "error": {
                "message": "Invalid API key",
                "type": "invalid_request_error",
                "code": "invalid_api_key"
            }
        }"#;

        let response: OpenAIErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.message, "Invalid API key");
        assert_eq!(response.error.error_type, "invalid_request_error");
    }
}
