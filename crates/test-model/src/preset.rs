use rulechat_model::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failure` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that answers with a single message.
    #[inline]
    pub fn with_message<S: Into<String>>(message: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(message.into())])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_script() {
        let script = json!({
            "events": [
                { "type": "message_delta", "data": "Let me " },
                {
                    "type": "tool_call",
                    "data": {
                        "id": "call_1",
                        "name": "calculator",
                        "arguments": { "expression": "1 + 1" }
                    }
                }
            ],
            "failures": 2
        });

        let preset: PresetResponse = serde_json::from_value(script).unwrap();
        assert_eq!(preset.failures, Some(2));
        assert_eq!(
            preset.events[0],
            PresetEvent::MessageDelta("Let me ".to_owned())
        );
        let PresetEvent::ToolCall(call) = &preset.events[1] else {
            panic!("expected a tool call");
        };
        assert_eq!(call.name, "calculator");
        assert_eq!(call.arguments, json!({ "expression": "1 + 1" }));
    }
}
