use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::QuestionEntity;

/// Question as shown to players while it is active. Never carries the answer.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct QuestionView {
    /// Question text.
    pub prompt: String,
    /// Answer options in display order.
    pub options: Vec<String>,
}

impl From<&QuestionEntity> for QuestionView {
    fn from(question: &QuestionEntity) -> Self {
        Self {
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        }
    }
}

/// A question the host already moved past, disclosed together with its answer.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct QuestionRecap {
    /// Position of the question in the run.
    pub index: i32,
    /// Question text.
    pub prompt: String,
    /// Answer options in display order.
    pub options: Vec<String>,
    /// Position of the correct option in `options`.
    pub correct_option_index: u32,
}

impl QuestionRecap {
    /// Recap of `question` found at `index`.
    pub fn new(index: i32, question: &QuestionEntity) -> Self {
        Self {
            index,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            correct_option_index: question.correct_option_index,
        }
    }
}
