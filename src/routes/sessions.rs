use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::session::SessionStatusResponse,
    error::AppError,
    services::{player_service, sse_service},
    state::SharedState,
};

/// Public, unauthenticated session views.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{session_id}/status", get(session_status))
        .route("/sessions/{session_id}/events", get(session_events))
}

/// Lobby view of a session, without answers.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/status",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Identifier of the quiz session")),
    responses(
        (status = 200, description = "Session status", body = SessionStatusResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn session_status(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(
        player_service::session_status(&state, &session_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/sessions/{session_id}/events",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Identifier of the quiz session")),
    responses((status = 200, description = "Session SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream join, question and end events of one session.
pub async fn session_events(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_session(&state, &session_id).await?;
    info!(session_id = %session_id, "new session SSE connection");
    Ok(sse_service::to_sse_stream(subscription, session_id))
}
