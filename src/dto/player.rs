//! DTO definitions used by the player REST API.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::dto::{
    question::QuestionView,
    validation::{validate_join_code, validate_question_index},
};

/// Request to join the session currently bound to a join code.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRequest {
    /// Join code bound to the session.
    pub join_code: String,
}

impl Validate for JoinRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_join_code(&self.join_code) {
            errors.add("join_code", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Active question handed to a player on join, without its answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// Quiz session identifier.
    pub session_id: String,
    /// Run counter, incremented by every start.
    pub run: i64,
    /// Active question index, -1 when not live.
    pub current_index: i32,
    /// Number of questions in the quiz.
    pub total_questions: u32,
    /// Active question without its answer.
    pub question: QuestionView,
}

/// Self-reported correctness of one answer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    /// Whether the chosen option was correct.
    pub was_correct: bool,
    /// Index the player answered; a different active index fails with `conflict`.
    #[serde(default)]
    pub question_index: Option<i32>,
}

impl Validate for SubmitAnswerRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_question_index(self.question_index) {
            errors.add("question_index", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Acknowledgement of a submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    /// False when the submission was ignored (duplicate, or the player never joined).
    pub recorded: bool,
    /// Answers reported correct.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_count: Option<u32>,
    /// Answers reported incorrect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incorrect_count: Option<u32>,
}

impl SubmitAnswerResponse {
    /// Acknowledgement for an ignored submission.
    pub fn ignored() -> Self {
        Self {
            recorded: false,
            correct_count: None,
            incorrect_count: None,
        }
    }
}

/// Query parameters of the reveal long-poll.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RevealQuery {
    /// Index of the question the player answered.
    pub observed_index: i32,
    /// Run the answer belongs to; a stale run is rejected.
    #[serde(default)]
    pub run: Option<i64>,
    /// Requested wait in milliseconds, clamped by configuration.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Outcome of a reveal long-poll.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RevealResponse {
    /// The host moved past `observed_index`; its answer can be shown.
    Revealed {
        /// Question the player answered.
        observed_index: i32,
        /// Correct option of that question.
        correct_option_index: u32,
        /// Active index after the move, or -1 when the run stopped.
        current_index: i32,
        /// Whether the run is still in progress.
        is_live: bool,
    },
    /// Nothing changed before the timeout; re-issue the wait.
    StillWaiting {
        /// Question the player answered.
        observed_index: i32,
    },
}
