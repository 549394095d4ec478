//! Session lifecycle: Idle, Live on a question index, Ended.
//!
//! Transitions are planned against a snapshot and applied by the caller through a
//! compare-and-set on that snapshot's version.

use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{NOT_LIVE_INDEX, QuestionEntity, SessionEntity, SessionPrecondition};

/// Lifecycle phases of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created but never started.
    Idle,
    /// A run is in progress and `index` is the active question.
    Live {
        /// Active question.
        index: usize,
    },
    /// At least one run happened and none is in progress.
    Ended,
}

impl SessionPhase {
    /// Derive the phase from a stored session record.
    pub fn of(session: &SessionEntity) -> Self {
        match (session.is_live, usize::try_from(session.current_index)) {
            (true, Ok(index)) => SessionPhase::Live { index },
            (false, _) if session.run == 0 => SessionPhase::Idle,
            _ => SessionPhase::Ended,
        }
    }
}

/// Host commands applied to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Begin a run with the given question snapshot.
    Start(Vec<QuestionEntity>),
    /// Move past the active question.
    Advance,
    /// Stop the run early.
    End,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start(_) => "start",
            SessionEvent::Advance => "advance",
            SessionEvent::End => "end",
        }
    }
}

/// Reasons a transition cannot be planned from the current record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// `Start` while a run is in progress.
    #[error("session is already live")]
    AlreadyLive,
    /// `Advance` outside of a run.
    #[error("session is not live")]
    NotLive,
    /// `Start` with a quiz that has no questions.
    #[error("quiz has no questions")]
    EmptyQuiz,
    /// `End` on a session that is not live; nothing to write.
    #[error("session is already stopped")]
    Unchanged,
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A validated transition, ready to be written with a compare-and-set.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan, used to correlate logs and events.
    pub id: PlanId,
    /// Phase the session is in.
    pub from: SessionPhase,
    /// Phase the session moves to.
    pub to: SessionPhase,
    /// Name of the event that produced the plan.
    pub event: &'static str,
    /// State the store must still hold for the write to apply.
    pub expected: SessionPrecondition,
    /// Record to write.
    pub next: SessionEntity,
}

impl Plan {
    /// Whether this transition terminated the run.
    pub fn finishes_run(&self) -> bool {
        matches!(self.from, SessionPhase::Live { .. }) && self.to == SessionPhase::Ended
    }
}

/// Validate `event` against `session` and compute the record that results from it.
pub fn plan(session: &SessionEntity, event: SessionEvent) -> Result<Plan, PlanError> {
    let from = SessionPhase::of(session);
    let event_name = event.name();
    let mut next = session.clone();

    let to = match (from, event) {
        (SessionPhase::Live { .. }, SessionEvent::Start(_)) => return Err(PlanError::AlreadyLive),
        (SessionPhase::Idle | SessionPhase::Ended, SessionEvent::Start(questions)) => {
            if questions.is_empty() {
                return Err(PlanError::EmptyQuiz);
            }
            next.questions = questions;
            next.run += 1;
            SessionPhase::Live { index: 0 }
        }
        (SessionPhase::Live { index }, SessionEvent::Advance) => {
            let following = index + 1;
            if following < session.questions.len() {
                SessionPhase::Live { index: following }
            } else {
                SessionPhase::Ended
            }
        }
        (SessionPhase::Idle | SessionPhase::Ended, SessionEvent::Advance) => {
            return Err(PlanError::NotLive);
        }
        (SessionPhase::Live { .. }, SessionEvent::End) => SessionPhase::Ended,
        (SessionPhase::Idle | SessionPhase::Ended, SessionEvent::End) => {
            return Err(PlanError::Unchanged);
        }
    };

    match to {
        SessionPhase::Live { index } => {
            next.is_live = true;
            next.current_index = index as i32;
        }
        SessionPhase::Idle | SessionPhase::Ended => {
            next.is_live = false;
            next.current_index = NOT_LIVE_INDEX;
        }
    }
    next.version = session.version + 1;
    next.updated_at = SystemTime::now();

    Ok(Plan {
        id: Uuid::new_v4(),
        from,
        to,
        event: event_name,
        expected: session.precondition(),
        next,
    })
}

/// `current_index == -1` exactly when the session is not live, and a live index is in range.
pub fn invariants_hold(session: &SessionEntity) -> bool {
    if session.is_live {
        usize::try_from(session.current_index)
            .map(|index| index < session.questions.len())
            .unwrap_or(false)
    } else {
        session.current_index == NOT_LIVE_INDEX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(count: usize) -> Vec<QuestionEntity> {
        (0..count)
            .map(|i| QuestionEntity {
                prompt: format!("Q{i}"),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_option_index: (i % 3) as u32,
            })
            .collect()
    }

    fn apply(session: &SessionEntity, event: SessionEvent) -> SessionEntity {
        let next = plan(session, event).unwrap().next;
        assert!(invariants_hold(&next));
        next
    }

    #[test]
    fn initial_state_is_idle() {
        let session = SessionEntity::idle("quiz".into(), 1);
        assert_eq!(SessionPhase::of(&session), SessionPhase::Idle);
        assert!(invariants_hold(&session));
    }

    #[test]
    fn full_run_ends_after_last_question() {
        let mut session = SessionEntity::idle("quiz".into(), 1);
        session = apply(&session, SessionEvent::Start(questions(3)));
        assert_eq!(SessionPhase::of(&session), SessionPhase::Live { index: 0 });
        assert_eq!(session.run, 1);

        session = apply(&session, SessionEvent::Advance);
        assert_eq!(SessionPhase::of(&session), SessionPhase::Live { index: 1 });
        session = apply(&session, SessionEvent::Advance);
        assert_eq!(SessionPhase::of(&session), SessionPhase::Live { index: 2 });

        let last = plan(&session, SessionEvent::Advance).unwrap();
        assert!(last.finishes_run());
        assert_eq!(last.from, SessionPhase::Live { index: 2 });
        session = last.next;
        assert_eq!(SessionPhase::of(&session), SessionPhase::Ended);
        assert_eq!(session.current_index, NOT_LIVE_INDEX);
        assert_eq!(session.version, 4);

        assert_eq!(
            plan(&session, SessionEvent::Advance).unwrap_err(),
            PlanError::NotLive
        );
    }

    #[test]
    fn start_while_live_is_rejected() {
        let session = apply(
            &SessionEntity::idle("quiz".into(), 1),
            SessionEvent::Start(questions(2)),
        );
        assert_eq!(
            plan(&session, SessionEvent::Start(questions(2))).unwrap_err(),
            PlanError::AlreadyLive
        );
    }

    #[test]
    fn restart_after_end_begins_new_run() {
        let mut session = apply(
            &SessionEntity::idle("quiz".into(), 1),
            SessionEvent::Start(questions(2)),
        );
        session = apply(&session, SessionEvent::End);
        assert_eq!(SessionPhase::of(&session), SessionPhase::Ended);

        session = apply(&session, SessionEvent::Start(questions(4)));
        assert_eq!(session.run, 2);
        assert_eq!(session.questions.len(), 4);
        assert_eq!(session.current_index, 0);
    }

    #[test]
    fn end_when_not_live_is_unchanged() {
        let idle = SessionEntity::idle("quiz".into(), 1);
        assert_eq!(
            plan(&idle, SessionEvent::End).unwrap_err(),
            PlanError::Unchanged
        );

        let ended = apply(
            &apply(&idle, SessionEvent::Start(questions(1))),
            SessionEvent::End,
        );
        assert_eq!(
            plan(&ended, SessionEvent::End).unwrap_err(),
            PlanError::Unchanged
        );
    }

    #[test]
    fn empty_quiz_cannot_start() {
        let idle = SessionEntity::idle("quiz".into(), 1);
        assert_eq!(
            plan(&idle, SessionEvent::Start(Vec::new())).unwrap_err(),
            PlanError::EmptyQuiz
        );
    }

    #[test]
    fn plan_carries_precondition_of_source_record() {
        let live = apply(
            &SessionEntity::idle("quiz".into(), 1),
            SessionEvent::Start(questions(2)),
        );
        let advance = plan(&live, SessionEvent::Advance).unwrap();
        assert_eq!(advance.expected, live.precondition());
        assert_eq!(advance.next.version, live.version + 1);
        assert_eq!(advance.event, "advance");
    }
}
