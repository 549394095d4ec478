//! DTO definitions used by the host REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::LedgerEntryEntity,
    dto::{
        format_system_time,
        question::{QuestionRecap, QuestionView},
        validation::validate_question_index,
    },
};

/// Join code freshly bound to a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct AllocateCodeResponse {
    /// Quiz session identifier.
    pub session_id: String,
    /// Join code bound to the session.
    pub join_code: String,
}

/// Response emitted when a run starts, including the first question without its answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartSessionResponse {
    /// Quiz session identifier.
    pub session_id: String,
    /// Join code bound to the session.
    pub join_code: String,
    /// Run counter, incremented by every start.
    pub run: i64,
    /// Active question index, -1 when not live.
    pub current_index: i32,
    /// Number of questions in the quiz.
    pub total_questions: u32,
    /// Active question without its answer.
    pub question: QuestionView,
}

/// Optional precondition attached to an advance request.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdvanceRequest {
    /// Index the host believes is active; a stale value fails with `conflict`.
    #[serde(default)]
    pub expected_index: Option<i32>,
}

impl Validate for AdvanceRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_question_index(self.expected_index) {
            errors.add("expected_index", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Result of moving past the active question.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdvanceResponse {
    /// The question that just completed, with its correct option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recap: Option<QuestionRecap>,
    /// New active index; absent once the run is finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_index: Option<i32>,
    /// Next question to display, without its answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    /// True when the advance moved past the last question.
    pub game_finished: bool,
}

/// Acknowledgement of an end request.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndSessionResponse {
    /// Quiz session identifier.
    pub session_id: String,
    /// False when the session was already stopped and nothing changed.
    pub was_live: bool,
}

/// Running tally of one participant.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantSummary {
    /// Player identity.
    pub player_id: i64,
    /// Answers reported correct.
    pub correct_count: u32,
    /// Answers reported incorrect.
    pub incorrect_count: u32,
    /// Number of questions in the quiz.
    pub total_questions: u32,
    /// First join time, RFC3339.
    pub joined_at: String,
}

impl From<LedgerEntryEntity> for ParticipantSummary {
    fn from(entry: LedgerEntryEntity) -> Self {
        Self {
            player_id: entry.player_id,
            correct_count: entry.correct_count,
            incorrect_count: entry.incorrect_count,
            total_questions: entry.total_questions,
            joined_at: format_system_time(entry.joined_at),
        }
    }
}

/// Participants of the current (or last) run of a session, in join order.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantsResponse {
    /// Quiz session identifier.
    pub session_id: String,
    /// Run counter, incremented by every start.
    pub run: i64,
    /// Participants in join order.
    pub participants: Vec<ParticipantSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_request_rejects_negative_index() {
        assert!(AdvanceRequest::default().validate().is_ok());
        let request: AdvanceRequest = serde_json::from_str(r#"{"expected_index": -2}"#).unwrap();
        assert!(request.validate().is_err());
    }
}
