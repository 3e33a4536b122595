use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::proxy::mappers::openai::{transform_chat_request, transform_chat_response};
use crate::proxy::state::AppState;
use crate::usage;

/// POST /v1/chat/completions
///
/// Translates the OpenAI payload to Claude Messages JSON, forwards it
/// upstream, captures rate-limit headers off the response, and translates the
/// answer back. Streaming responses pass through verbatim; the core never
/// reshapes token streams.
pub async fn handle_chat_completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, (StatusCode, String)> {
    // Only the routing fields are probed here; the translator does its own
    // best-effort parse of the full payload.
    let probe: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let model = probe["model"].as_str().unwrap_or("").to_string();
    let stream = probe["stream"].as_bool().unwrap_or(false);

    info!("[OpenAI] chat completion: model={} stream={}", model, stream);

    let (claude_body, session_id) = transform_chat_request(&model, &body, stream);

    let upstream_response = state.upstream.send_messages(claude_body).await.map_err(|e| {
        error!("[OpenAI] upstream request failed: {}", e);
        (StatusCode::BAD_GATEWAY, format!("upstream request failed: {}", e))
    })?;

    usage::capture_rate_limit(upstream_response.headers(), state.upstream.source(), &model);

    let status = upstream_response.status();
    if !status.is_success() {
        let detail = upstream_response.text().await.unwrap_or_default();
        debug!("[OpenAI] upstream returned {}: {}", status, detail);
        return Err((status, detail));
    }

    if stream {
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(upstream_response.bytes_stream()))
            .map_err(|e| {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("stream relay failed: {}", e))
            })?;
        return Ok(response);
    }

    let raw = upstream_response.bytes().await.map_err(|e| {
        (StatusCode::BAD_GATEWAY, format!("upstream body read failed: {}", e))
    })?;
    let out = transform_chat_response(&model, &session_id, &raw);
    let out: Value = serde_json::from_slice(&out).unwrap_or(Value::Null);
    Ok(Json(out).into_response())
}

/// GET /v1/models
pub async fn handle_models(State(state): State<AppState>) -> Json<Value> {
    let created = chrono::Utc::now().timestamp();
    let data: Vec<Value> = state
        .models
        .iter()
        .map(|model| {
            json!({
                "id": model,
                "object": "model",
                "created": created,
                "owned_by": "trestle",
            })
        })
        .collect();
    Json(json!({"object": "list", "data": data}))
}

pub async fn health_check_handler() -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
    .into_response()
}
