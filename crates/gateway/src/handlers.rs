use crate::SharedState;
use crate::error::ApiError;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use simulai_core::EngineMetrics;
use simulai_engine::{ChatReply, ChatRequest, EngineReply, EngineRequest};
use simulai_telemetry::EngineSelection;
use tracing::{debug, error, info};

fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Rejected non-JSON body");
        ApiError::bad_request("Request body must be valid JSON")
    })
}

pub(crate) async fn unified_engine(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EngineReply>, ApiError> {
    let user_id = state.authenticate(&headers).await?;
    let mut request = EngineRequest::from_json(&parse_body(&body)?, state.max_prompt_chars)?;

    if request.user_id.as_deref().is_some_and(|id| id != user_id) {
        debug!("Body userId differs from the token's user; using the token");
    }
    request.user_id = Some(user_id.clone());

    info!(action = %request.action, user = %user_id, "Unified engine request");
    let reply = state.services.engine.handle(request, Some(&user_id)).await?;
    Ok(Json(reply))
}

pub(crate) async fn agent_chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatReply>, ApiError> {
    let user_id = state.authenticate(&headers).await?;
    let request = ChatRequest::from_json(&parse_body(&body)?, state.max_prompt_chars)?;

    info!(session = %request.session_id, action = %request.action, "Agent chat request");
    let reply = state
        .services
        .chat
        .handle(&user_id, request)
        .await
        .map_err(ApiError::from_chat)?;
    Ok(Json(reply))
}

#[derive(Serialize)]
pub(crate) struct EngineStatus {
    success: bool,
    engines: Vec<EngineMetrics>,
    selection: EngineSelection,
}

pub(crate) async fn engine_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<EngineStatus>, ApiError> {
    state.authenticate(&headers).await?;

    let health = &state.services.health;
    let engines = health.snapshot().await.map_err(|e| {
        error!(error = %e, "Failed to read engine metrics");
        ApiError::internal()
    })?;
    let selection = health.select(None).await.map_err(|e| {
        error!(error = %e, "Failed to compute engine selection");
        ApiError::internal()
    })?;

    Ok(Json(EngineStatus {
        success: true,
        engines,
        selection,
    }))
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
