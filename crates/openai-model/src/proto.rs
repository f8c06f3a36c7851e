use rulechat_model::{
    ModelFinishReason, ModelMessage, ModelRequest, ModelResponse, ModelTool,
    ResponseFormat, ToolCallRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as produced by the model.
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormatParam {
    JsonObject,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatParam>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let response_format = match req.response_format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonObject => Some(ResponseFormatParam::JsonObject),
    };
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        response_format,
        stream: false,
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(content) => Message::Assistant {
            content: Some(content.clone()),
            tool_calls: None,
        },
        ModelMessage::AssistantToolCalls {
            content,
            tool_calls,
        } => Message::Assistant {
            content: content.clone(),
            tool_calls: Some(tool_calls.iter().map(create_tool_call).collect()),
        },
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
    }
}

fn create_tool_call(req: &ToolCallRequest) -> ToolCall {
    ToolCall {
        id: req.id.clone(),
        r#type: "function".to_owned(),
        function: FunctionCall {
            name: req.name.clone(),
            arguments: req.arguments.to_string(),
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Converts the first choice of a completion. Returns `None` if the
/// completion has no choices at all.
pub fn convert_completion(completion: ChatCompletion) -> Option<ModelResponse> {
    let choice = completion.choices.into_iter().next()?;
    let tool_calls: Vec<_> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallRequest {
            id: call.id,
            name: call.function.name,
            // Malformed arguments are passed through as a string, the tool
            // will reject them and the model gets to see why.
            arguments: serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments)),
        })
        .collect();
    let finish_reason = match choice.finish_reason.as_deref() {
        Some("tool_calls") => ModelFinishReason::ToolCalls,
        Some("length") => ModelFinishReason::Length,
        _ if !tool_calls.is_empty() => ModelFinishReason::ToolCalls,
        _ => ModelFinishReason::Stop,
    };
    Some(ModelResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason,
    })
}

/// Returns `true` if the first choice was cut off by the content filter.
pub fn is_content_filtered(completion: &ChatCompletion) -> bool {
    completion
        .choices
        .first()
        .and_then(|choice| choice.finish_reason.as_deref())
        == Some("content_filter")
}

#[cfg(test)]
mod tests {
    use rulechat_model::ToolCallResult;
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("Respond with JSON.".to_owned()),
                ModelMessage::User("What is 2 + 2?".to_owned()),
                ModelMessage::AssistantToolCalls {
                    content: None,
                    tool_calls: vec![ToolCallRequest {
                        id: "call_1".to_owned(),
                        name: "calculator".to_owned(),
                        arguments: json!({ "expression": "2 + 2" }),
                    }],
                },
                ModelMessage::Tool(ToolCallResult {
                    id: "call_1".to_owned(),
                    content: "4".to_owned(),
                }),
            ],
            tools: vec![ModelTool {
                name: "calculator".to_owned(),
                description: "Evaluates arithmetic.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
            response_format: ResponseFormat::JsonObject,
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();

        let payload =
            serde_json::to_value(create_request(&request, &config)).unwrap();
        assert_eq!(
            payload,
            json!({
                "model": "custom",
                "messages": [
                    { "role": "system", "content": "Respond with JSON." },
                    { "role": "user", "content": "What is 2 + 2?" },
                    {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "calculator",
                                "arguments": "{\"expression\":\"2 + 2\"}"
                            }
                        }]
                    },
                    { "role": "tool", "tool_call_id": "call_1", "content": "4" }
                ],
                "tools": [{
                    "type": "function",
                    "function": {
                        "name": "calculator",
                        "description": "Evaluates arithmetic.",
                        "parameters": { "type": "object" }
                    }
                }],
                "response_format": { "type": "json_object" },
                "stream": false
            })
        );
    }

    #[test]
    fn test_text_request_omits_optional_fields() {
        let request = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            ..Default::default()
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();
        let payload =
            serde_json::to_value(create_request(&request, &config)).unwrap();
        assert!(payload.get("tools").is_none());
        assert!(payload.get("response_format").is_none());
    }

    #[test]
    fn test_convert_text_completion() {
        let completion: ChatCompletion = serde_json::from_str(include_str!(
            "../fixtures/text_completion.json"
        ))
        .unwrap();
        assert!(!is_content_filtered(&completion));
        let resp = convert_completion(completion).unwrap();
        assert_eq!(
            resp.content,
            r#"{"response": "Hi there!", "continue_chatting": true}"#
        );
        assert_eq!(resp.finish_reason, ModelFinishReason::Stop);
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn test_convert_tool_call_completion() {
        let completion: ChatCompletion = serde_json::from_str(include_str!(
            "../fixtures/tool_call_completion.json"
        ))
        .unwrap();
        let resp = convert_completion(completion).unwrap();
        assert_eq!(resp.finish_reason, ModelFinishReason::ToolCalls);
        assert_eq!(resp.content, "");
        assert_eq!(resp.tool_calls.len(), 2);
        assert_eq!(resp.tool_calls[0].id, "call_abc");
        assert_eq!(
            resp.tool_calls[0].arguments,
            json!({ "expression": "12 * 7" })
        );
        // The second call carries arguments that are not valid JSON.
        assert_eq!(resp.tool_calls[1].arguments, json!("{expression: 3"));
    }

    #[test]
    fn test_empty_choices() {
        let completion = ChatCompletion {
            id: "chatcmpl-0".to_owned(),
            choices: vec![],
        };
        assert!(convert_completion(completion).is_none());
    }
}
