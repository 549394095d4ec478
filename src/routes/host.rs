use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::host::{
        AdvanceRequest, AdvanceResponse, AllocateCodeResponse, EndSessionResponse,
        ParticipantsResponse, StartSessionResponse,
    },
    error::AppError,
    routes::identity::OwnerId,
    services::host_service,
    state::SharedState,
};

/// Host-only endpoints driving a session through its runs.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/host/sessions/{session_id}/code", post(allocate_code))
        .route("/host/sessions/{session_id}/start", post(start_session))
        .route("/host/sessions/{session_id}/advance", post(advance_session))
        .route("/host/sessions/{session_id}/end", post(end_session))
        .route(
            "/host/sessions/{session_id}/participants",
            get(list_participants),
        )
}

/// Reserve a fresh join code for the session, releasing the previous one.
#[utoipa::path(
    post,
    path = "/host/sessions/{session_id}/code",
    tag = "host",
    params(("X-Owner-Id" = i64, Header, description = "Host identity"),
    ("session_id" = String, Path, description = "Identifier of the quiz session")),
    responses(
        (status = 200, description = "Join code bound to the session", body = AllocateCodeResponse),
        (status = 403, description = "Session owned by another host"),
        (status = 409, description = "Session live; its code stays bound until the run stops"),
        (status = 503, description = "No free join code or storage unavailable")
    )
)]
pub async fn allocate_code(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Path(session_id): Path<String>,
) -> Result<Json<AllocateCodeResponse>, AppError> {
    Ok(Json(
        host_service::allocate_code(&state, &session_id, owner_id).await?,
    ))
}

/// Start a new run and return its first question.
#[utoipa::path(
    post,
    path = "/host/sessions/{session_id}/start",
    tag = "host",
    params(("X-Owner-Id" = i64, Header, description = "Host identity"),
    ("session_id" = String, Path, description = "Identifier of the quiz session")),
    responses(
        (status = 200, description = "Run started", body = StartSessionResponse),
        (status = 404, description = "Unknown quiz"),
        (status = 409, description = "Session already live")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Path(session_id): Path<String>,
) -> Result<Json<StartSessionResponse>, AppError> {
    Ok(Json(host_service::start(&state, &session_id, owner_id).await?))
}

/// Move past the active question and receive its recap.
#[utoipa::path(
    post,
    path = "/host/sessions/{session_id}/advance",
    tag = "host",
    params(("X-Owner-Id" = i64, Header, description = "Host identity"),
    ("session_id" = String, Path, description = "Identifier of the quiz session")),
    request_body(content = AdvanceRequest, description = "Optional expected index", content_type = "application/json"),
    responses(
        (status = 200, description = "Question advanced or run finished", body = AdvanceResponse),
        (status = 409, description = "Session not live or expected index stale")
    )
)]
pub async fn advance_session(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Path(session_id): Path<String>,
    payload: Option<Json<AdvanceRequest>>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;
    Ok(Json(
        host_service::advance(&state, &session_id, owner_id, payload.expected_index).await?,
    ))
}

/// Stop the running session; a no-op when it is already stopped.
#[utoipa::path(
    post,
    path = "/host/sessions/{session_id}/end",
    tag = "host",
    params(("X-Owner-Id" = i64, Header, description = "Host identity"),
    ("session_id" = String, Path, description = "Identifier of the quiz session")),
    responses((status = 200, description = "Session stopped", body = EndSessionResponse))
)]
pub async fn end_session(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Path(session_id): Path<String>,
) -> Result<Json<EndSessionResponse>, AppError> {
    Ok(Json(host_service::end(&state, &session_id, owner_id).await?))
}

/// List the participants of the current run with their tallies.
#[utoipa::path(
    get,
    path = "/host/sessions/{session_id}/participants",
    tag = "host",
    params(("X-Owner-Id" = i64, Header, description = "Host identity"),
    ("session_id" = String, Path, description = "Identifier of the quiz session")),
    responses((status = 200, description = "Participants in join order", body = ParticipantsResponse))
)]
pub async fn list_participants(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Path(session_id): Path<String>,
) -> Result<Json<ParticipantsResponse>, AppError> {
    Ok(Json(
        host_service::participants(&state, &session_id, owner_id).await?,
    ))
}
