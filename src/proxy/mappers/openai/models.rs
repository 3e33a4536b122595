use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound Chat Completions payload. Every field defaults so that a
/// best-effort parse of partial or malformed input still yields a usable
/// request; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop: Option<Value>,
    pub stream: bool,
    /// String level ("low", "high", …) or a numeric token budget.
    pub reasoning_effort: Option<Value>,
    /// Raw Claude-style system subtree, passed through verbatim.
    pub system: Option<Value>,
    pub tools: Option<Vec<Value>>,
    pub tool_choice: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: Option<OpenAIContent>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OpenAIContent {
    String(String),
    Array(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text", alias = "input_text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
    /// Assistant-authored tool invocation already in Claude shape.
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolFunction {
    pub name: String,
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_with_minimal_fields() {
        let req: OpenAIRequest = serde_json::from_value(json!({
            "model": "claude-sonnet-4-5",
            "messages": [{"role": "user", "content": "hello"}]
        }))
        .expect("request should deserialize");
        assert_eq!(req.model, "claude-sonnet-4-5");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(
            req.messages[0].content,
            Some(OpenAIContent::String("hello".to_string()))
        );
    }

    #[test]
    fn unknown_part_types_do_not_break_parsing() {
        let req: OpenAIRequest = serde_json::from_value(json!({
            "model": "claude-sonnet-4-5",
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "look at this"},
                {"type": "video_url", "video_url": {"url": "https://example.com/v.mp4"}}
            ]}]
        }))
        .expect("request should deserialize");
        let Some(OpenAIContent::Array(parts)) = &req.messages[0].content else {
            panic!("expected array content");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], ContentPart::Unknown);
    }

    #[test]
    fn unknown_top_level_fields_are_ignored() {
        let req: OpenAIRequest = serde_json::from_value(json!({
            "model": "gpt-5",
            "frequency_penalty": 0.5,
            "logit_bias": {"50256": -100}
        }))
        .expect("request should deserialize");
        assert_eq!(req.model, "gpt-5");
        assert!(req.messages.is_empty());
    }
}
