//! Router for the chat API

use axum::{Json, Router, extract::State, extract::rejection::JsonRejection, routing::post};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::SharedState;

/// Answer a single message. Failures inside the assistant are already
/// turned into text so this only errors on a bad request body.
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<public::ChatRequest>, JsonRejection>,
) -> Result<Json<public::ChatResponse>, ApiError> {
    let Json(payload) = payload.map_err(ApiError::bad_request)?;
    tracing::debug!("Chat message: {}", payload.message);

    let output = state.assistant.handle_intent(&payload.message).await;

    Ok(Json(public::ChatResponse::new(&output)))
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(chat_handler))
}
