use chrono::Utc;
use serde_json::{json, Value};

use super::thinking::render_thinking_marker;
use crate::proxy::signature_cache::SignatureCache;
use crate::proxy::thinking_cache::ThinkingCache;

/// Translates a non-streaming Claude Messages response into an OpenAI chat
/// completion. Thinking blocks are cached under the request's session id and
/// re-emitted into the assistant text as a `<think>` block plus a thinkId
/// marker, which is what lets the next turn restore the signed block.
pub fn transform_chat_response(model_name: &str, session_id: &str, raw: &[u8]) -> Vec<u8> {
    let claude: Value = serde_json::from_slice(raw).unwrap_or(Value::Null);

    let mut text = String::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    if let Some(blocks) = claude["content"].as_array() {
        for block in blocks {
            match block["type"].as_str() {
                Some("thinking") => {
                    let thinking = block["thinking"].as_str().unwrap_or("");
                    let signature = block["signature"].as_str().unwrap_or("");
                    if thinking.is_empty() {
                        continue;
                    }
                    let thinking_id = ThinkingCache::generate_id(thinking);
                    ThinkingCache::global().put(session_id, &thinking_id, thinking, signature);
                    SignatureCache::global().put(model_name, thinking, signature);
                    text.push_str(&render_thinking_marker(thinking, &thinking_id));
                }
                Some("text") => {
                    text.push_str(block["text"].as_str().unwrap_or(""));
                }
                Some("tool_use") => {
                    tool_calls.push(json!({
                        "id": block["id"],
                        "type": "function",
                        "function": {
                            "name": block["name"],
                            "arguments": block["input"].to_string(),
                        },
                    }));
                }
                _ => {}
            }
        }
    }

    let finish_reason = match claude["stop_reason"].as_str() {
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        _ => "stop",
    };

    let mut message = json!({"role": "assistant", "content": text});
    if !tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(tool_calls);
    }

    let input_tokens = claude["usage"]["input_tokens"].as_u64().unwrap_or(0);
    let output_tokens = claude["usage"]["output_tokens"].as_u64().unwrap_or(0);

    let out = json!({
        "id": format!("chatcmpl-{}", claude["id"].as_str().unwrap_or("unknown")),
        "object": "chat.completion",
        "created": Utc::now().timestamp(),
        "model": model_name,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason,
        }],
        "usage": {
            "prompt_tokens": input_tokens,
            "completion_tokens": output_tokens,
            "total_tokens": input_tokens + output_tokens,
        },
    });

    serde_json::to_vec(&out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(session_id: &str, claude: Value) -> Value {
        let raw = serde_json::to_vec(&claude).expect("serialize input");
        let out = transform_chat_response("claude-sonnet-4-5", session_id, &raw);
        serde_json::from_slice(&out).expect("valid JSON output")
    }

    #[test]
    fn text_response_maps_to_chat_completion() {
        let out = transform(
            "",
            json!({
                "id": "msg_01",
                "content": [{"type": "text", "text": "The answer is 4."}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 12, "output_tokens": 7}
            }),
        );
        assert_eq!(out["object"], "chat.completion");
        assert_eq!(out["id"], "chatcmpl-msg_01");
        assert_eq!(out["choices"][0]["message"]["content"], "The answer is 4.");
        assert_eq!(out["choices"][0]["finish_reason"], "stop");
        assert_eq!(out["usage"]["total_tokens"], 19);
    }

    #[test]
    fn thinking_block_is_cached_and_marked() {
        let session_id = ThinkingCache::generate_id("response mapper session");
        let signature = "r".repeat(64);
        let out = transform(
            &session_id,
            json!({
                "id": "msg_02",
                "content": [
                    {"type": "thinking", "thinking": "carry the one", "signature": signature},
                    {"type": "text", "text": "Done."}
                ],
                "stop_reason": "end_turn"
            }),
        );

        let thinking_id = ThinkingCache::generate_id("carry the one");
        let content = out["choices"][0]["message"]["content"].as_str().expect("content");
        assert!(content.contains("<think>carry the one</think>"));
        assert!(content.contains(&format!("```plaintext:thinkId:{}```", thinking_id)));
        assert!(content.ends_with("Done."));

        let entry = ThinkingCache::global()
            .get(&session_id, &thinking_id)
            .expect("thinking should be cached for the next turn");
        assert_eq!(entry.thinking, "carry the one");
        assert_eq!(entry.signature, signature);
        assert_eq!(
            SignatureCache::global().get("claude-sonnet-4-5", "carry the one"),
            signature
        );
    }

    #[test]
    fn tool_use_blocks_become_tool_calls() {
        let out = transform(
            "",
            json!({
                "id": "msg_03",
                "content": [{
                    "type": "tool_use",
                    "id": "toolu_xyz",
                    "name": "get_weather",
                    "input": {"city": "X"}
                }],
                "stop_reason": "tool_use"
            }),
        );
        let call = &out["choices"][0]["message"]["tool_calls"][0];
        assert_eq!(call["id"], "toolu_xyz");
        assert_eq!(call["function"]["name"], "get_weather");
        assert_eq!(call["function"]["arguments"], "{\"city\":\"X\"}");
        assert_eq!(out["choices"][0]["finish_reason"], "tool_calls");
    }

    #[test]
    fn max_tokens_maps_to_length() {
        let out = transform(
            "",
            json!({
                "id": "msg_04",
                "content": [{"type": "text", "text": "truncat"}],
                "stop_reason": "max_tokens"
            }),
        );
        assert_eq!(out["choices"][0]["finish_reason"], "length");
    }
}
