use serde::Serialize;
use tracing::{info, warn};

use crate::{
    dao::models::LedgerEntryEntity,
    dto::sse::{
        Handshake, PlayerJoinedEvent, QuestionChangedEvent, ServerEvent, SessionEndedEvent,
    },
    state::{
        SharedState,
        session_machine::{Plan, SessionPhase},
    },
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_QUESTION_CHANGED: &str = "question.changed";
const EVENT_SESSION_ENDED: &str = "session.ended";

/// Fan an accepted transition out to reveal waiters and SSE subscribers.
///
/// Must only be called after the compare-and-set that applied `plan` succeeded.
pub fn publish_transition(state: &SharedState, plan: &Plan) {
    let session = &plan.next;
    state.reveals().publish(session);

    info!(
        plan_id = %plan.id,
        session_id = %session.session_id,
        event = plan.event,
        from = ?plan.from,
        to = ?plan.to,
        run = session.run,
        "session transition applied"
    );

    match plan.to {
        SessionPhase::Live { .. } => {
            let payload = QuestionChangedEvent {
                session_id: session.session_id.clone(),
                run: session.run,
                current_index: session.current_index,
                total_questions: session.questions.len() as u32,
            };
            send_session_event(state, &session.session_id, EVENT_QUESTION_CHANGED, &payload);
        }
        SessionPhase::Ended | SessionPhase::Idle => {
            let payload = SessionEndedEvent {
                session_id: session.session_id.clone(),
                run: session.run,
                finished: plan.event == "advance",
            };
            send_session_event(state, &session.session_id, EVENT_SESSION_ENDED, &payload);
        }
    }
}

/// Broadcast that a player joined the current run for the first time.
pub fn broadcast_player_joined(state: &SharedState, entry: &LedgerEntryEntity) {
    let payload = PlayerJoinedEvent {
        session_id: entry.session_id.clone(),
        run: entry.run,
        player_id: entry.player_id,
    };
    send_session_event(state, &entry.session_id, EVENT_PLAYER_JOINED, &payload);
}

/// Build the handshake sent to a single new subscriber, exposing the degraded flag.
pub async fn handshake_event(state: &SharedState, session_id: &str) -> Option<ServerEvent> {
    let payload = Handshake {
        session_id: session_id.to_owned(),
        degraded: state.is_degraded().await,
    };
    match ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize session SSE handshake");
            None
        }
    }
}

fn send_session_event(
    state: &SharedState,
    session_id: &str,
    event: &str,
    payload: &impl Serialize,
) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.events().broadcast(session_id, event),
        Err(err) => warn!(event, error = %err, "failed to serialize session SSE payload"),
    }
}
