//! Host-side operations: join-code allocation and the start/advance/end transitions.
//!
//! Every operation is scoped to `(session_id, owner_id)` and every write goes through the
//! store's compare-and-set, so two processes (or a retried request) racing on the same session
//! see exactly one of them applied.

use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};

use crate::{
    dao::{models::SessionEntity, session_store::SessionStore},
    dto::{
        host::{
            AdvanceResponse, AllocateCodeResponse, EndSessionResponse, ParticipantSummary,
            ParticipantsResponse, StartSessionResponse,
        },
        question::{QuestionRecap, QuestionView},
    },
    error::ServiceError,
    services::{join_code, sse_events},
    state::{
        Backend, SharedState,
        session_machine::{self, PlanError, SessionEvent, SessionPhase},
    },
};

/// Attempts made by `end` before reporting a conflict.
const MAX_END_ATTEMPTS: u32 = 5;

/// Reserve a fresh join code for the session, releasing the one previously bound to it.
///
/// The code announced at start stays bound while the run is live.
pub async fn allocate_code(
    state: &SharedState,
    session_id: &str,
    owner_id: i64,
) -> Result<AllocateCodeResponse, ServiceError> {
    let backend = state.require_backend().await?;
    let session = load_or_create_session(&backend, session_id, owner_id).await?;
    if session.is_live {
        return Err(ServiceError::AlreadyLive(session_id.to_owned()));
    }
    let session = bind_new_code(state, &backend.sessions, session).await?;

    Ok(AllocateCodeResponse {
        session_id: session.session_id,
        join_code: session.join_code.unwrap_or_default(),
    })
}

/// Start a new run from the quiz definition, returning its first question without the answer.
pub async fn start(
    state: &SharedState,
    session_id: &str,
    owner_id: i64,
) -> Result<StartSessionResponse, ServiceError> {
    let backend = state.require_backend().await?;
    let quiz = backend
        .quizzes
        .find_quiz(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quiz `{session_id}` not found")))?;
    if quiz.owner_id != owner_id {
        return Err(forbidden(session_id, owner_id));
    }

    let mut session = load_or_create_session(&backend, session_id, owner_id).await?;
    if session.is_live {
        return Err(ServiceError::AlreadyLive(session_id.to_owned()));
    }
    if session.join_code.is_none() {
        session = bind_new_code(state, &backend.sessions, session).await?;
    }

    let plan = session_machine::plan(&session, SessionEvent::Start(quiz.questions))
        .map_err(|err| ServiceError::from_plan(session_id, err))?;
    if !backend
        .sessions
        .compare_and_swap(plan.expected, plan.next.clone())
        .await?
    {
        return Err(stale(session_id));
    }
    sse_events::publish_transition(state, &plan);

    let started = plan.next;
    let question = started
        .question(started.current_index)
        .map(QuestionView::from)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("quiz `{session_id}` has no questions"))
        })?;

    Ok(StartSessionResponse {
        session_id: started.session_id.clone(),
        join_code: started.join_code.clone().unwrap_or_default(),
        run: started.run,
        current_index: started.current_index,
        total_questions: started.questions.len() as u32,
        question,
    })
}

/// Move past the active question, disclosing its answer to the host.
///
/// When `expected_index` is given and no longer matches the active question the call fails with
/// [`ServiceError::Conflict`], so a retried request cannot advance twice.
pub async fn advance(
    state: &SharedState,
    session_id: &str,
    owner_id: i64,
    expected_index: Option<i32>,
) -> Result<AdvanceResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let session = load_owned_session(&store, session_id, owner_id).await?;

    let plan = session_machine::plan(&session, SessionEvent::Advance)
        .map_err(|err| ServiceError::from_plan(session_id, err))?;
    if let Some(expected) = expected_index.filter(|index| *index != session.current_index) {
        return Err(ServiceError::Conflict(format!(
            "session `{session_id}` is at question {} (expected {expected})",
            session.current_index
        )));
    }

    if !store
        .compare_and_swap(plan.expected, plan.next.clone())
        .await?
    {
        return Err(stale(session_id));
    }
    sse_events::publish_transition(state, &plan);

    let recap = session
        .question(session.current_index)
        .map(|question| QuestionRecap::new(session.current_index, question));

    Ok(match plan.to {
        SessionPhase::Live { index } => AdvanceResponse {
            recap,
            next_index: Some(plan.next.current_index),
            question: plan.next.questions.get(index).map(QuestionView::from),
            game_finished: false,
        },
        SessionPhase::Ended | SessionPhase::Idle => AdvanceResponse {
            recap,
            next_index: None,
            question: None,
            game_finished: true,
        },
    })
}

/// Stop the running session. Ending a session that is not live is a no-op success.
pub async fn end(
    state: &SharedState,
    session_id: &str,
    owner_id: i64,
) -> Result<EndSessionResponse, ServiceError> {
    let store = state.require_session_store().await?;

    for attempt in 1..=MAX_END_ATTEMPTS {
        let session = load_owned_session(&store, session_id, owner_id).await?;
        let plan = match session_machine::plan(&session, SessionEvent::End) {
            Ok(plan) => plan,
            Err(PlanError::Unchanged) => {
                debug!(session_id, "end requested on a stopped session");
                return Ok(EndSessionResponse {
                    session_id: session_id.to_owned(),
                    was_live: false,
                });
            }
            Err(err) => return Err(ServiceError::from_plan(session_id, err)),
        };

        if store
            .compare_and_swap(plan.expected, plan.next.clone())
            .await?
        {
            sse_events::publish_transition(state, &plan);
            return Ok(EndSessionResponse {
                session_id: session_id.to_owned(),
                was_live: true,
            });
        }
        debug!(session_id, attempt, "end lost a race; retrying");
    }

    warn!(session_id, "end kept losing races");
    Err(stale(session_id))
}

/// List the participants of the session's current (or last) run, in join order.
pub async fn participants(
    state: &SharedState,
    session_id: &str,
    owner_id: i64,
) -> Result<ParticipantsResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let session = load_owned_session(&store, session_id, owner_id).await?;
    let entries = store.list_ledger_entries(session_id, session.run).await?;

    Ok(ParticipantsResponse {
        session_id: session.session_id,
        run: session.run,
        participants: entries.into_iter().map(ParticipantSummary::from).collect(),
    })
}

async fn load_owned_session(
    store: &Arc<dyn SessionStore>,
    session_id: &str,
    owner_id: i64,
) -> Result<SessionEntity, ServiceError> {
    let session = store
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
    if session.owner_id != owner_id {
        return Err(forbidden(session_id, owner_id));
    }
    Ok(session)
}

/// Load the live record, creating an idle one from the quiz definition the first time.
async fn load_or_create_session(
    backend: &Backend,
    session_id: &str,
    owner_id: i64,
) -> Result<SessionEntity, ServiceError> {
    if backend.sessions.find_session(session_id).await?.is_none() {
        let quiz = backend
            .quizzes
            .find_quiz(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("quiz `{session_id}` not found")))?;
        if quiz.owner_id != owner_id {
            return Err(forbidden(session_id, owner_id));
        }
        if backend
            .sessions
            .create_session(SessionEntity::idle(quiz.session_id, quiz.owner_id))
            .await?
        {
            info!(session_id, owner_id, "session record created");
        }
    }

    load_owned_session(&backend.sessions, session_id, owner_id).await
}

async fn bind_new_code(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    session: SessionEntity,
) -> Result<SessionEntity, ServiceError> {
    let session_id = session.session_id.as_str();
    let code = join_code::allocate(store.as_ref(), &state.config().join_code, session_id).await?;

    let next = SessionEntity {
        join_code: Some(code.clone()),
        version: session.version + 1,
        updated_at: SystemTime::now(),
        ..session.clone()
    };
    if !store
        .compare_and_swap(session.precondition(), next.clone())
        .await?
    {
        store.release_join_code(&code, session_id).await?;
        return Err(stale(session_id));
    }

    if let Some(previous) = session.join_code.as_deref() {
        store.release_join_code(previous, session_id).await?;
    }
    info!(session_id, join_code = %code, "join code bound");
    Ok(next)
}

fn forbidden(session_id: &str, owner_id: i64) -> ServiceError {
    ServiceError::Forbidden(format!(
        "session `{session_id}` is not owned by host {owner_id}"
    ))
}

fn stale(session_id: &str) -> ServiceError {
    ServiceError::Conflict(format!(
        "session `{session_id}` changed concurrently; refetch and retry"
    ))
}
