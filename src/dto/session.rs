use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::SessionEntity;

/// Public view of a session used for lobby polling. Carries no answers.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    /// Quiz session identifier.
    pub session_id: String,
    /// Join code bound to the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_code: Option<String>,
    /// Whether a run is in progress.
    pub is_live: bool,
    /// Active question index, -1 when not live.
    pub current_index: i32,
    /// Number of questions in the quiz.
    pub total_questions: u32,
    /// Run counter, incremented by every start.
    pub run: i64,
}

impl From<&SessionEntity> for SessionStatusResponse {
    fn from(session: &SessionEntity) -> Self {
        Self {
            session_id: session.session_id.clone(),
            join_code: session.join_code.clone(),
            is_live: session.is_live,
            current_index: session.current_index,
            total_questions: session.questions.len() as u32,
            run: session.run,
        }
    }
}
