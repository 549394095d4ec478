use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the live quiz backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::host::allocate_code,
        crate::routes::host::start_session,
        crate::routes::host::advance_session,
        crate::routes::host::end_session,
        crate::routes::host::list_participants,
        crate::routes::player::join_session,
        crate::routes::player::submit_answer,
        crate::routes::player::await_reveal,
        crate::routes::sessions::session_status,
        crate::routes::sessions::session_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::question::QuestionView,
            crate::dto::question::QuestionRecap,
            crate::dto::host::AllocateCodeResponse,
            crate::dto::host::StartSessionResponse,
            crate::dto::host::AdvanceRequest,
            crate::dto::host::AdvanceResponse,
            crate::dto::host::EndSessionResponse,
            crate::dto::host::ParticipantSummary,
            crate::dto::host::ParticipantsResponse,
            crate::dto::player::JoinRequest,
            crate::dto::player::JoinResponse,
            crate::dto::player::SubmitAnswerRequest,
            crate::dto::player::SubmitAnswerResponse,
            crate::dto::player::RevealResponse,
            crate::dto::session::SessionStatusResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::PlayerJoinedEvent,
            crate::dto::sse::QuestionChangedEvent,
            crate::dto::sse::SessionEndedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "host", description = "Host operations driving a session"),
        (name = "player", description = "Player operations: join, answer, reveal"),
        (name = "sessions", description = "Public session status and event streams"),
    )
)]
/// Generated API document type.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/host/sessions/{session_id}/code",
            "/host/sessions/{session_id}/advance",
            "/play/join",
            "/play/sessions/{session_id}/reveal",
            "/sessions/{session_id}/events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
