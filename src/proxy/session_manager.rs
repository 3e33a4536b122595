use crate::proxy::mappers::openai::models::{ContentPart, OpenAIContent, OpenAIRequest};
use crate::proxy::thinking_cache::ThinkingCache;

/// Session fingerprinting for thinking restoration.
///
/// Only the first user message's text is hashed; model names and timestamps
/// stay out of the key so every turn of the same conversation maps to the
/// same session id.
pub struct SessionManager;

impl SessionManager {
    /// Stable 32-hex fingerprint of the first user message with textual
    /// content. Empty when no user message carries text, in which case no
    /// thinking restoration happens for the request.
    pub fn extract_session_id(request: &OpenAIRequest) -> String {
        for msg in &request.messages {
            if msg.role != "user" {
                continue;
            }
            let text = match &msg.content {
                Some(OpenAIContent::String(s)) => s.clone(),
                Some(OpenAIContent::Array(parts)) => parts
                    .iter()
                    .find_map(|part| match part {
                        ContentPart::Text { text } => Some(text.clone()),
                        _ => None,
                    })
                    .unwrap_or_default(),
                None => continue,
            };
            if !text.is_empty() {
                let sid = ThinkingCache::generate_id(&text);
                tracing::debug!("[SessionManager] Derived session id: {}", sid);
                return sid;
            }
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_from(value: serde_json::Value) -> OpenAIRequest {
        serde_json::from_value(value).expect("request should deserialize")
    }

    #[test]
    fn session_id_hashes_first_user_text() {
        let req = request_from(json!({
            "model": "claude-sonnet-4-5",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "recall the proof"},
                {"role": "user", "content": "and then?"}
            ]
        }));
        assert_eq!(
            SessionManager::extract_session_id(&req),
            ThinkingCache::generate_id("recall the proof")
        );
    }

    #[test]
    fn session_id_reads_first_text_part_of_array_content() {
        let req = request_from(json!({
            "model": "claude-sonnet-4-5",
            "messages": [{"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AA=="}},
                {"type": "text", "text": "what is in this image?"}
            ]}]
        }));
        assert_eq!(
            SessionManager::extract_session_id(&req),
            ThinkingCache::generate_id("what is in this image?")
        );
    }

    #[test]
    fn session_id_is_empty_without_user_text() {
        let req = request_from(json!({
            "model": "claude-sonnet-4-5",
            "messages": [{"role": "system", "content": "be brief"}]
        }));
        assert_eq!(SessionManager::extract_session_id(&req), "");
    }

    #[test]
    fn empty_first_user_message_falls_through_to_next() {
        let req = request_from(json!({
            "model": "claude-sonnet-4-5",
            "messages": [
                {"role": "user", "content": ""},
                {"role": "user", "content": "second turn"}
            ]
        }));
        assert_eq!(
            SessionManager::extract_session_id(&req),
            ThinkingCache::generate_id("second turn")
        );
    }
}
