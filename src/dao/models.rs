use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Sentinel stored in `current_index` while a session is not live.
pub const NOT_LIVE_INDEX: i32 = -1;

/// Multiple-choice question as authored in the quiz repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Text shown to players.
    pub prompt: String,
    /// Ordered answer options (2 to 4 entries).
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_option_index: u32,
}

/// Quiz definition read from the quiz repository when a session starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizEntity {
    /// Caller-chosen identifier, shared with the live session record.
    pub session_id: String,
    /// Identity of the host allowed to drive the session.
    pub owner_id: i64,
    /// Ordered questions.
    pub questions: Vec<QuestionEntity>,
}

/// Durable live state of a quiz session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Identifier of the quiz definition this session runs.
    pub session_id: String,
    /// Host identity; every host operation is scoped to it.
    pub owner_id: i64,
    /// Join code currently bound to the session, if any.
    pub join_code: Option<String>,
    /// Question snapshot taken at start; immutable while live.
    pub questions: Vec<QuestionEntity>,
    /// Whether a run is in progress.
    pub is_live: bool,
    /// Active question, or [`NOT_LIVE_INDEX`] when not live.
    pub current_index: i32,
    /// Number of runs started so far (0 means never started).
    pub run: i64,
    /// Incremented by every accepted write; used as compare-and-set token.
    pub version: i64,
    /// Last time the record changed.
    pub updated_at: SystemTime,
}

impl SessionEntity {
    /// Fresh, never-started record for the given quiz.
    pub fn idle(session_id: String, owner_id: i64) -> Self {
        Self {
            session_id,
            owner_id,
            join_code: None,
            questions: Vec::new(),
            is_live: false,
            current_index: NOT_LIVE_INDEX,
            run: 0,
            version: 0,
            updated_at: SystemTime::now(),
        }
    }

    /// Precondition matching this exact snapshot.
    pub fn precondition(&self) -> SessionPrecondition {
        SessionPrecondition {
            version: self.version,
            is_live: self.is_live,
            current_index: self.current_index,
        }
    }

    /// Question at `index`, if it exists.
    pub fn question(&self, index: i32) -> Option<&QuestionEntity> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.questions.get(index))
    }
}

/// Fields a conditional session write must still observe to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPrecondition {
    /// Expected `version`.
    pub version: i64,
    /// Expected `is_live`.
    pub is_live: bool,
    /// Expected `current_index`.
    pub current_index: i32,
}

/// Per-player running tally for one run of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntryEntity {
    /// Session the player joined.
    pub session_id: String,
    /// Run of the session the entry belongs to.
    pub run: i64,
    /// Player identity.
    pub player_id: i64,
    /// Answers reported correct.
    pub correct_count: u32,
    /// Answers reported incorrect.
    pub incorrect_count: u32,
    /// Number of questions in the session when the player joined.
    pub total_questions: u32,
    /// Question index of the last accepted submission ([`NOT_LIVE_INDEX`] when none).
    pub last_submitted_index: i32,
    /// When the entry was created.
    pub joined_at: SystemTime,
}

impl LedgerEntryEntity {
    /// Zeroed tally for a player joining `session` right now.
    pub fn new(session: &SessionEntity, player_id: i64) -> Self {
        Self {
            session_id: session.session_id.clone(),
            run: session.run,
            player_id,
            correct_count: 0,
            incorrect_count: 0,
            total_questions: session.questions.len() as u32,
            last_submitted_index: NOT_LIVE_INDEX,
            joined_at: SystemTime::now(),
        }
    }
}

/// Result of creating a ledger entry if absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredLedgerEntry {
    /// The stored entry (existing or freshly created).
    pub entry: LedgerEntryEntity,
    /// True when this call created it.
    pub created: bool,
}

/// Result of recording one answer against a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerRecord {
    /// The counter was incremented; carries the updated entry.
    Recorded(LedgerEntryEntity),
    /// An answer for this question index was already recorded.
    Duplicate,
    /// The player never joined this run.
    MissingEntry,
}
