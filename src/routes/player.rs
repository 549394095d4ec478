use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::player::{
        JoinRequest, JoinResponse, RevealQuery, RevealResponse, SubmitAnswerRequest,
        SubmitAnswerResponse,
    },
    error::AppError,
    routes::identity::PlayerId,
    services::player_service,
    state::SharedState,
};

/// Player endpoints: join, answer, reveal.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/play/join", post(join_session))
        .route("/play/sessions/{session_id}/answers", post(submit_answer))
        .route("/play/sessions/{session_id}/reveal", get(await_reveal))
}

/// Join the live session bound to a join code.
#[utoipa::path(
    post,
    path = "/play/join",
    tag = "player",
    params(("X-Player-Id" = i64, Header, description = "Player identity")),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Active question without its answer", body = JoinResponse),
        (status = 404, description = "Unknown join code"),
        (status = 409, description = "Session not live yet; wait in the lobby")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    PlayerId(player_id): PlayerId,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        player_service::join(&state, player_id, &payload.join_code).await?,
    ))
}

/// Report whether the answer to the active question was correct.
#[utoipa::path(
    post,
    path = "/play/sessions/{session_id}/answers",
    tag = "player",
    params(("X-Player-Id" = i64, Header, description = "Player identity"),
    ("session_id" = String, Path, description = "Identifier of the quiz session")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Submission acknowledged", body = SubmitAnswerResponse),
        (status = 409, description = "Session not live or question no longer active")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    PlayerId(player_id): PlayerId,
    Path(session_id): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        player_service::submit_answer(
            &state,
            &session_id,
            player_id,
            payload.was_correct,
            payload.question_index,
        )
        .await?,
    ))
}

/// Wait until the host moves past the observed question, then reveal its answer.
#[utoipa::path(
    get,
    path = "/play/sessions/{session_id}/reveal",
    tag = "player",
    params(("X-Player-Id" = i64, Header, description = "Player identity"),
    ("session_id" = String, Path, description = "Identifier of the quiz session"),
    RevealQuery),
    responses(
        (status = 200, description = "Revealed answer or still waiting", body = RevealResponse),
        (status = 409, description = "The answered run is over")
    )
)]
pub async fn await_reveal(
    State(state): State<SharedState>,
    PlayerId(_player_id): PlayerId,
    Path(session_id): Path<String>,
    Query(query): Query<RevealQuery>,
) -> Result<Json<RevealResponse>, AppError> {
    Ok(Json(
        player_service::await_reveal(
            &state,
            &session_id,
            query.observed_index,
            query.run,
            query.timeout_ms,
        )
        .await?,
    ))
}
