use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name.
    pub event: Option<String>,
    /// Serialized JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already serialised payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Quiz session identifier.
    pub session_id: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player joins the current run for the first time.
pub struct PlayerJoinedEvent {
    /// Quiz session identifier.
    pub session_id: String,
    /// Run counter, incremented by every start.
    pub run: i64,
    /// Player identity.
    pub player_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a run starts or the active question changes.
pub struct QuestionChangedEvent {
    /// Quiz session identifier.
    pub session_id: String,
    /// Run counter, incremented by every start.
    pub run: i64,
    /// Active question index, -1 when not live.
    pub current_index: i32,
    /// Number of questions in the quiz.
    pub total_questions: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a run stops, either after the last question or on request.
pub struct SessionEndedEvent {
    /// Quiz session identifier.
    pub session_id: String,
    /// Run counter, incremented by every start.
    pub run: i64,
    /// True when the run ended by advancing past the last question.
    pub finished: bool,
}
