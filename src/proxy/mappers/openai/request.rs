use std::sync::OnceLock;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::models::{ContentPart, OpenAIContent, OpenAIMessage, OpenAIRequest};
use super::thinking;
use crate::constants::DEFAULT_MAX_TOKENS;
use crate::proxy::session_manager::SessionManager;

/// Translates an OpenAI Chat Completions payload into Claude Messages JSON.
///
/// Parsing is best-effort: unknown fields are ignored and a payload that does
/// not parse at all produces an envelope with empty messages rather than an
/// error. Returns the translated body together with the derived session id so
/// the response direction can cache thinking under the same key.
pub fn transform_chat_request(model_name: &str, raw: &[u8], stream: bool) -> (Vec<u8>, String) {
    let request: OpenAIRequest = serde_json::from_slice(raw).unwrap_or_else(|e| {
        tracing::debug!("[OpenAI-Request] Malformed payload, proceeding best-effort: {}", e);
        OpenAIRequest::default()
    });

    let session_id = SessionManager::extract_session_id(&request);

    let mut out = json!({
        "model": model_name,
        "max_tokens": DEFAULT_MAX_TOKENS,
        "messages": [],
        "metadata": {"user_id": request_identity()},
    });

    if let Some(effort) = &request.reasoning_effort {
        if let Some(budget) = thinking::convert_effort_to_budget(effort) {
            match budget {
                0 => out["thinking"] = json!({"type": "disabled"}),
                -1 => out["thinking"] = json!({"type": "enabled"}),
                b if b > 0 => {
                    out["thinking"] = json!({"type": "enabled", "budget_tokens": b});
                }
                _ => {}
            }
        }
    }

    if let Some(max_tokens) = request.max_tokens {
        out["max_tokens"] = json!(max_tokens);
    }

    // Extended thinking requires temperature 1; otherwise temperature and
    // top_p are mutually exclusive on the Claude side, temperature winning.
    let thinking_enabled = out["thinking"]["type"] == "enabled";
    if thinking_enabled {
        out["temperature"] = json!(1);
    } else if let Some(temperature) = request.temperature {
        out["temperature"] = json!(temperature);
    } else if let Some(top_p) = request.top_p {
        out["top_p"] = json!(top_p);
    }

    if let Some(stop) = &request.stop {
        if let Some(sequences) = stop.as_array() {
            let sequences: Vec<&str> = sequences.iter().filter_map(|v| v.as_str()).collect();
            if !sequences.is_empty() {
                out["stop_sequences"] = json!(sequences);
            }
        } else if let Some(sequence) = stop.as_str() {
            out["stop_sequences"] = json!([sequence]);
        }
    }

    out["stream"] = json!(stream);
    if let Some(system) = &request.system {
        out["system"] = system.clone();
    }

    out["messages"] = Value::Array(build_messages(&request, &session_id, model_name));

    if let Some(tools) = &request.tools {
        let mapped = map_tool_declarations(tools);
        if !mapped.is_empty() {
            out["tools"] = Value::Array(mapped);
        }
    }
    if let Some(choice) = &request.tool_choice {
        if let Some(mapped) = map_tool_choice(choice) {
            out["tool_choice"] = mapped;
        }
    }

    (serde_json::to_vec(&out).unwrap_or_default(), session_id)
}

fn build_messages(request: &OpenAIRequest, session_id: &str, model_name: &str) -> Vec<Value> {
    let mut messages: Vec<Value> = Vec::new();
    // Claude Messages has no system role; system content collects into a
    // synthetic user message at the position of the first system entry.
    let mut system_message_index: Option<usize> = None;

    for message in &request.messages {
        match message.role.as_str() {
            "system" => {
                if system_message_index.is_none() {
                    messages.push(json!({"role": "user", "content": []}));
                    system_message_index = Some(messages.len() - 1);
                }
                let Some(index) = system_message_index else {
                    continue;
                };
                let Some(container) = messages[index]["content"].as_array_mut() else {
                    continue;
                };
                match &message.content {
                    Some(OpenAIContent::String(text)) if !text.is_empty() => {
                        container.push(json!({"type": "text", "text": text}));
                    }
                    Some(OpenAIContent::Array(parts)) => {
                        for part in parts {
                            if let ContentPart::Text { text } = part {
                                container.push(json!({"type": "text", "text": text}));
                            }
                        }
                    }
                    _ => {}
                }
            }
            "user" | "assistant" => {
                messages.push(build_chat_message(message, session_id, model_name));
            }
            "tool" => {
                let tool_use_id = message.tool_call_id.clone().unwrap_or_default();
                messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": tool_content_value(&message.content),
                    }],
                }));
            }
            other => {
                tracing::debug!("[OpenAI-Request] Skipping unrecognized role: {}", other);
            }
        }
    }

    messages
}

fn build_chat_message(message: &OpenAIMessage, session_id: &str, model_name: &str) -> Value {
    let mut content: Vec<Value> = Vec::new();

    match &message.content {
        Some(OpenAIContent::String(text)) if !text.is_empty() => {
            content.extend(thinking::extract_thinking_parts(session_id, model_name, text));
        }
        Some(OpenAIContent::Array(parts)) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => {
                        content.extend(thinking::extract_thinking_parts(
                            session_id, model_name, text,
                        ));
                    }
                    ContentPart::ImageUrl { image_url } => {
                        if let Some(image) = convert_image_part(&image_url.url) {
                            content.push(image);
                        }
                    }
                    ContentPart::ToolUse { id, name, input } => {
                        content.push(json!({
                            "type": "tool_use",
                            "id": id,
                            "name": name,
                            "input": input,
                        }));
                    }
                    ContentPart::ToolResult { tool_use_id, content: result } => {
                        content.push(json!({
                            "type": "tool_result",
                            "tool_use_id": tool_use_id,
                            "content": result,
                        }));
                    }
                    ContentPart::Unknown => {}
                }
            }
        }
        _ => {}
    }

    if message.role == "assistant" {
        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                if call.call_type != "function" {
                    continue;
                }
                let id = if call.id.is_empty() {
                    generate_tool_call_id()
                } else {
                    call.id.clone()
                };
                let input = serde_json::from_str::<Value>(&call.function.arguments)
                    .ok()
                    .filter(|v| v.is_object())
                    .unwrap_or_else(|| json!({}));
                content.push(json!({
                    "type": "tool_use",
                    "id": id,
                    "name": call.function.name,
                    "input": input,
                }));
            }
        }
    }

    json!({"role": message.role, "content": content})
}

/// OpenAI data URLs become Claude base64 image sources; anything that is not
/// a data URL is dropped silently.
fn convert_image_part(url: &str) -> Option<Value> {
    if !url.starts_with("data:") {
        return None;
    }
    let pieces: Vec<&str> = url.splitn(2, ',').collect();
    if pieces.len() != 2 {
        return None;
    }
    let media_type = pieces[0]
        .split(';')
        .next()
        .unwrap_or("")
        .trim_start_matches("data:");
    Some(json!({
        "type": "image",
        "source": {
            "type": "base64",
            "media_type": media_type,
            "data": pieces[1],
        },
    }))
}

fn tool_content_value(content: &Option<OpenAIContent>) -> Value {
    match content {
        Some(OpenAIContent::String(text)) => json!(text),
        Some(OpenAIContent::Array(parts)) => {
            let parts: Vec<Value> = parts
                .iter()
                .filter(|part| !matches!(part, ContentPart::Unknown))
                .filter_map(|part| serde_json::to_value(part).ok())
                .collect();
            Value::Array(parts)
        }
        None => json!(""),
    }
}

fn map_tool_declarations(tools: &[Value]) -> Vec<Value> {
    let mut declarations = Vec::new();
    for tool in tools {
        match tool.get("type").and_then(|v| v.as_str()) {
            Some("function") => {
                let function = tool.get("function").cloned().unwrap_or_else(|| json!({}));
                let mut declaration = json!({
                    "name": function.get("name").and_then(|v| v.as_str()).unwrap_or(""),
                    "description": function.get("description").and_then(|v| v.as_str()).unwrap_or(""),
                });
                let schema = function
                    .get("parameters")
                    .or_else(|| function.get("parametersJsonSchema"));
                if let Some(schema) = schema {
                    declaration["input_schema"] = schema.clone();
                }
                declarations.push(declaration);
            }
            Some(_) => {}
            None => {
                // Cursor-style bare tools carry their fields at the top level.
                let mut declaration = json!({
                    "name": tool.get("name").and_then(|v| v.as_str()).unwrap_or(""),
                    "description": tool.get("description").and_then(|v| v.as_str()).unwrap_or(""),
                });
                let schema = tool.get("input_schema").or_else(|| tool.get("parameters"));
                if let Some(schema) = schema {
                    declaration["input_schema"] = schema.clone();
                }
                declarations.push(declaration);
            }
        }
    }
    declarations
}

fn map_tool_choice(choice: &Value) -> Option<Value> {
    if let Some(mode) = choice.as_str() {
        return match mode {
            "auto" => Some(json!({"type": "auto"})),
            "required" => Some(json!({"type": "any"})),
            // "none" maps to omitting tool_choice entirely.
            _ => None,
        };
    }
    if choice.get("type").and_then(|v| v.as_str()) == Some("function") {
        let name = choice
            .get("function")
            .and_then(|f| f.get("name"))
            .and_then(|v| v.as_str())?;
        return Some(json!({"type": "tool", "name": name}));
    }
    None
}

/// `toolu_` plus 24 characters drawn uniformly from the 62-letter alphanumeric
/// alphabet by a cryptographically secure RNG.
fn generate_tool_call_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("toolu_{}", suffix)
}

/// Stable per-process caller identity: two process-lifetime UUIDs mixed
/// through SHA-256, created lazily on the first translation.
fn request_identity() -> &'static str {
    static IDENTITY: OnceLock<String> = OnceLock::new();
    IDENTITY.get_or_init(|| {
        let account = uuid::Uuid::new_v4();
        let session = uuid::Uuid::new_v4();
        let mixed = format!("{:x}", Sha256::digest(format!("{account}{session}").as_bytes()));
        format!("user_{mixed}_account_{account}_session_{session}")
    })
}
