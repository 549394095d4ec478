use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{LedgerEntryEntity, QuestionEntity, QuizEntity, SessionEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    owner_id: i64,
    #[serde(default)]
    join_code: Option<String>,
    #[serde(default)]
    questions: Vec<QuestionEntity>,
    is_live: bool,
    current_index: i32,
    #[serde(default)]
    run: i64,
    #[serde(default)]
    version: i64,
    updated_at: DateTime,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.session_id,
            owner_id: value.owner_id,
            join_code: value.join_code,
            questions: value.questions,
            is_live: value.is_live,
            current_index: value.current_index,
            run: value.run,
            version: value.version,
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoSessionDocument> for SessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            session_id: value.id,
            owner_id: value.owner_id,
            join_code: value.join_code,
            questions: value.questions,
            is_live: value.is_live,
            current_index: value.current_index,
            run: value.run,
            version: value.version,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoJoinCodeDocument {
    #[serde(rename = "_id")]
    pub code: String,
    pub session_id: String,
    pub reserved_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLedgerDocument {
    session_id: String,
    run: i64,
    player_id: i64,
    correct_count: i64,
    incorrect_count: i64,
    total_questions: i64,
    last_submitted_index: i32,
    joined_at: DateTime,
}

impl From<MongoLedgerDocument> for LedgerEntryEntity {
    fn from(value: MongoLedgerDocument) -> Self {
        Self {
            session_id: value.session_id,
            run: value.run,
            player_id: value.player_id,
            correct_count: value.correct_count.max(0) as u32,
            incorrect_count: value.incorrect_count.max(0) as u32,
            total_questions: value.total_questions.max(0) as u32,
            last_submitted_index: value.last_submitted_index,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    id: String,
    owner_id: i64,
    questions: Vec<QuestionEntity>,
}

impl From<MongoQuizDocument> for QuizEntity {
    fn from(value: MongoQuizDocument) -> Self {
        Self {
            session_id: value.id,
            owner_id: value.owner_id,
            questions: value.questions,
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

pub fn ledger_key(session_id: &str, run: i64, player_id: i64) -> Document {
    doc! {"session_id": session_id, "run": run, "player_id": player_id}
}

/// Fields written only when a join creates the ledger entry.
pub fn ledger_insert_fields(entry: &LedgerEntryEntity) -> Document {
    doc! {
        "correct_count": 0_i64,
        "incorrect_count": 0_i64,
        "total_questions": i64::from(entry.total_questions),
        "last_submitted_index": entry.last_submitted_index,
        "joined_at": DateTime::from_system_time(entry.joined_at),
    }
}
