//! Player-side operations: joining by code, reporting answers and waiting for reveals.

use tracing::{debug, warn};

use crate::{
    dao::models::{AnswerRecord, LedgerEntryEntity, SessionEntity},
    dto::{
        player::{JoinResponse, RevealResponse, SubmitAnswerResponse},
        question::QuestionView,
        session::SessionStatusResponse,
    },
    error::ServiceError,
    services::sse_events,
    state::{SharedState, reveal::SessionSignal},
};

/// Join the live session bound to `join_code`, creating the player's tally on first join.
///
/// Returns the active question without its answer. A session that is not running yields
/// [`ServiceError::NotLive`], the lobby signal clients are expected to retry on.
pub async fn join(
    state: &SharedState,
    player_id: i64,
    join_code: &str,
) -> Result<JoinResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let session = store
        .find_session_by_code(join_code)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("invalid join code `{join_code}`")))?;

    if !session.is_live {
        debug!(session_id = %session.session_id, player_id, "join while session is not live");
        return Err(ServiceError::NotLive(session.session_id));
    }
    let question = session
        .question(session.current_index)
        .map(QuestionView::from)
        .ok_or_else(|| ServiceError::NotLive(session.session_id.clone()))?;

    let ensured = store
        .ensure_ledger_entry(LedgerEntryEntity::new(&session, player_id))
        .await?;
    if ensured.created {
        debug!(session_id = %session.session_id, run = session.run, player_id, "player joined");
        sse_events::broadcast_player_joined(state, &ensured.entry);
    }

    Ok(JoinResponse {
        session_id: session.session_id.clone(),
        run: session.run,
        current_index: session.current_index,
        total_questions: session.questions.len() as u32,
        question,
    })
}

/// Count one self-reported answer for the active question.
///
/// Duplicates for the same question and submissions from players who never joined are
/// acknowledged with `recorded = false` instead of failing.
pub async fn submit_answer(
    state: &SharedState,
    session_id: &str,
    player_id: i64,
    was_correct: bool,
    question_index: Option<i32>,
) -> Result<SubmitAnswerResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let session = store
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;

    if !session.is_live {
        return Err(ServiceError::NotLive(session_id.to_owned()));
    }
    if let Some(index) = question_index.filter(|index| *index != session.current_index) {
        return Err(ServiceError::Conflict(format!(
            "question {index} is not active (active question is {})",
            session.current_index
        )));
    }

    let record = store
        .record_answer(
            session_id,
            session.run,
            player_id,
            session.current_index,
            was_correct,
        )
        .await?;

    Ok(match record {
        AnswerRecord::Recorded(entry) => SubmitAnswerResponse {
            recorded: true,
            correct_count: Some(entry.correct_count),
            incorrect_count: Some(entry.incorrect_count),
        },
        AnswerRecord::Duplicate => {
            debug!(
                session_id,
                player_id,
                index = session.current_index,
                "duplicate answer ignored"
            );
            SubmitAnswerResponse::ignored()
        }
        AnswerRecord::MissingEntry => {
            warn!(
                session_id,
                player_id,
                run = session.run,
                "answer from a player without ledger entry ignored"
            );
            SubmitAnswerResponse::ignored()
        }
    })
}

/// Long-poll until the host moves past `observed_index`, then disclose its correct option.
///
/// The waiter is registered before the session is read, so a transition landing in between is
/// still observed. When nothing changes within the (clamped) timeout the call returns
/// [`RevealResponse::StillWaiting`] and the caller re-issues it. A `run` other than the
/// session's current one is a conflict.
pub async fn await_reveal(
    state: &SharedState,
    session_id: &str,
    observed_index: i32,
    run: Option<i64>,
    timeout_ms: Option<u64>,
) -> Result<RevealResponse, ServiceError> {
    let store = state.require_session_store().await?;
    if observed_index < 0 {
        return Err(ServiceError::InvalidInput(format!(
            "observed index must be >= 0 (got {observed_index})"
        )));
    }

    let mut waiter = state.reveals().register(session_id);
    let session = store
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
    if let Some(run) = run.filter(|run| *run != session.run) {
        return Err(ServiceError::Conflict(format!(
            "run {run} of session `{session_id}` is over; current run is {}",
            session.run
        )));
    }

    let Some(question) = session.question(observed_index).cloned() else {
        return Err(ServiceError::InvalidInput(format!(
            "session `{session_id}` has no question {observed_index}"
        )));
    };
    if session.is_live && observed_index > session.current_index {
        return Err(ServiceError::InvalidInput(format!(
            "question {observed_index} has not been reached yet"
        )));
    }

    let revealed = |signal: SessionSignal| RevealResponse::Revealed {
        observed_index,
        correct_option_index: question.correct_option_index,
        current_index: signal.current_index,
        is_live: signal.is_live,
    };

    let current = SessionSignal::from(&session);
    if current.moved_past(session.run, observed_index) {
        return Ok(revealed(current));
    }

    let limit = state.config().reveal.effective_timeout(timeout_ms);
    if let Some(signal) = waiter
        .wait_moved(session.run, observed_index, session.version, limit)
        .await
    {
        return Ok(revealed(signal));
    }
    drop(waiter);

    // Transitions applied by another process never reach the local registry.
    if let Some(latest) = store.find_session(session_id).await?.as_ref() {
        let latest = SessionSignal::from(latest);
        if latest.moved_past(session.run, observed_index) {
            return Ok(revealed(latest));
        }
    }

    debug!(session_id, observed_index, "reveal wait timed out");
    Ok(RevealResponse::StillWaiting { observed_index })
}

/// Public lobby view of a session.
pub async fn session_status(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionStatusResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let session: SessionEntity = store
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
    Ok(SessionStatusResponse::from(&session))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::models::SessionEntity,
        services::{fixtures, host_service},
    };

    async fn ledger(state: &SharedState, session_id: &str, run: i64) -> Vec<LedgerEntryEntity> {
        state
            .require_session_store()
            .await
            .unwrap()
            .list_ledger_entries(session_id, run)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn join_requires_a_known_code_and_a_live_session() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;

        assert!(matches!(
            join(&state, 10, "0000").await.unwrap_err(),
            ServiceError::NotFound(_)
        ));

        let code = host_service::allocate_code(&state, "quiz", 1)
            .await
            .unwrap()
            .join_code;
        assert!(matches!(
            join(&state, 10, &code).await.unwrap_err(),
            ServiceError::NotLive(_)
        ));
        assert!(ledger(&state, "quiz", 0).await.is_empty());

        host_service::start(&state, "quiz", 1).await.unwrap();
        let joined = join(&state, 10, &code).await.unwrap();
        assert_eq!(joined.current_index, 0);
        assert_eq!(joined.question.prompt, "Q0");
        assert_eq!(joined.total_questions, 2);
    }

    #[tokio::test]
    async fn rejoining_keeps_existing_counts() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;
        let code = host_service::start(&state, "quiz", 1).await.unwrap().join_code;

        join(&state, 10, &code).await.unwrap();
        submit_answer(&state, "quiz", 10, true, None).await.unwrap();
        join(&state, 10, &code).await.unwrap();

        let entries = ledger(&state, "quiz", 1).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].correct_count, 1);
        assert_eq!(entries[0].total_questions, 2);
    }

    #[tokio::test]
    async fn duplicate_submission_for_same_question_counts_once() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;
        let code = host_service::start(&state, "quiz", 1).await.unwrap().join_code;
        join(&state, 10, &code).await.unwrap();

        let first = submit_answer(&state, "quiz", 10, true, Some(0)).await.unwrap();
        assert!(first.recorded);
        let second = submit_answer(&state, "quiz", 10, true, Some(0)).await.unwrap();
        assert!(!second.recorded);

        let entries = ledger(&state, "quiz", 1).await;
        assert_eq!(entries[0].correct_count, 1);
        assert_eq!(entries[0].incorrect_count, 0);
    }

    #[tokio::test]
    async fn submission_without_join_is_ignored() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;
        host_service::start(&state, "quiz", 1).await.unwrap();

        let ack = submit_answer(&state, "quiz", 99, false, None).await.unwrap();
        assert!(!ack.recorded);
        assert!(ledger(&state, "quiz", 1).await.is_empty());
    }

    #[tokio::test]
    async fn submission_checks_liveness_and_active_index() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;
        host_service::allocate_code(&state, "quiz", 1).await.unwrap();
        assert!(matches!(
            submit_answer(&state, "quiz", 10, true, None).await.unwrap_err(),
            ServiceError::NotLive(_)
        ));

        let code = host_service::start(&state, "quiz", 1).await.unwrap().join_code;
        join(&state, 10, &code).await.unwrap();
        assert!(matches!(
            submit_answer(&state, "quiz", 10, true, Some(1)).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn reveal_is_immediate_once_the_host_moved_on() {
        let state = fixtures::state_with_quiz("quiz", 1, &[2, 0]).await;
        host_service::start(&state, "quiz", 1).await.unwrap();
        host_service::advance(&state, "quiz", 1, None).await.unwrap();

        let outcome = await_reveal(&state, "quiz", 0, None, Some(10)).await.unwrap();
        assert_eq!(
            outcome,
            RevealResponse::Revealed {
                observed_index: 0,
                correct_option_index: 2,
                current_index: 1,
                is_live: true,
            }
        );
    }

    #[tokio::test]
    async fn reveal_times_out_with_still_waiting() {
        let state = fixtures::state_with_quiz("quiz", 1, &[2, 0]).await;
        host_service::start(&state, "quiz", 1).await.unwrap();

        let outcome = await_reveal(&state, "quiz", 0, None, Some(20)).await.unwrap();
        assert_eq!(outcome, RevealResponse::StillWaiting { observed_index: 0 });
        assert_eq!(state.reveals().session_count(), 0);
    }

    #[tokio::test]
    async fn reveal_never_discloses_a_question_not_reached() {
        let state = fixtures::state_with_quiz("quiz", 1, &[2, 0, 1]).await;
        host_service::start(&state, "quiz", 1).await.unwrap();

        assert!(matches!(
            await_reveal(&state, "quiz", 1, None, Some(10)).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            await_reveal(&state, "quiz", 7, None, Some(10)).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            await_reveal(&state, "quiz", -1, None, Some(10)).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn reveal_for_a_previous_run_is_a_conflict() {
        let state = fixtures::state_with_quiz("quiz", 1, &[2, 0]).await;
        let first = host_service::start(&state, "quiz", 1).await.unwrap();
        host_service::end(&state, "quiz", 1).await.unwrap();
        let second = host_service::start(&state, "quiz", 1).await.unwrap();
        assert_ne!(first.run, second.run);

        assert!(matches!(
            await_reveal(&state, "quiz", 0, Some(first.run), Some(10))
                .await
                .unwrap_err(),
            ServiceError::Conflict(_)
        ));
        assert_eq!(state.reveals().session_count(), 0);

        let outcome = await_reveal(&state, "quiz", 0, Some(second.run), Some(10))
            .await
            .unwrap();
        assert_eq!(outcome, RevealResponse::StillWaiting { observed_index: 0 });
    }

    #[tokio::test]
    async fn reveal_wakes_when_the_run_is_ended() {
        let state = fixtures::state_with_quiz("quiz", 1, &[2, 0]).await;
        host_service::start(&state, "quiz", 1).await.unwrap();

        let waiting = {
            let state = state.clone();
            tokio::spawn(async move { await_reveal(&state, "quiz", 0, None, Some(5_000)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        host_service::end(&state, "quiz", 1).await.unwrap();

        let outcome = waiting.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            RevealResponse::Revealed {
                observed_index: 0,
                correct_option_index: 2,
                current_index: -1,
                is_live: false,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reveal_and_advance_race_never_misses_the_wakeup() {
        for round in 0..50 {
            let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;
            host_service::start(&state, "quiz", 1).await.unwrap();

            let waiter = {
                let state = state.clone();
                tokio::spawn(async move { await_reveal(&state, "quiz", 0, None, Some(2_000)).await })
            };
            let host = {
                let state = state.clone();
                tokio::spawn(async move {
                    if round % 2 == 0 {
                        tokio::task::yield_now().await;
                    }
                    host_service::advance(&state, "quiz", 1, None).await
                })
            };

            host.await.unwrap().unwrap();
            let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter must wake before its own timeout")
                .unwrap()
                .unwrap();
            assert!(matches!(
                outcome,
                RevealResponse::Revealed {
                    correct_option_index: 1,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn many_waiters_share_one_channel_and_are_released() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;
        host_service::start(&state, "quiz", 1).await.unwrap();

        let waiters: Vec<_> = (0..200)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { await_reveal(&state, "quiz", 0, None, Some(5_000)).await })
            })
            .collect();
        while state.reveals().waiter_count("quiz") < 200 {
            tokio::task::yield_now().await;
        }
        assert_eq!(state.reveals().session_count(), 1);

        host_service::advance(&state, "quiz", 1, None).await.unwrap();
        for waiter in waiters {
            assert!(matches!(
                waiter.await.unwrap().unwrap(),
                RevealResponse::Revealed { .. }
            ));
        }
        assert_eq!(state.reveals().session_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_releases_its_registration() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;
        host_service::start(&state, "quiz", 1).await.unwrap();

        let pending = {
            let state = state.clone();
            tokio::spawn(async move { await_reveal(&state, "quiz", 0, None, Some(60_000)).await })
        };
        while state.reveals().waiter_count("quiz") == 0 {
            tokio::task::yield_now().await;
        }
        pending.abort();
        let _ = pending.await;
        assert_eq!(state.reveals().session_count(), 0);

        let session: SessionEntity = state
            .require_session_store()
            .await
            .unwrap()
            .find_session("quiz")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.current_index, 0);
    }

    #[tokio::test]
    async fn three_question_walkthrough() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0, 2]).await;

        let started = host_service::start(&state, "quiz", 1).await.unwrap();
        assert_eq!(started.current_index, 0);

        let joined = join(&state, 42, &started.join_code).await.unwrap();
        assert_eq!(joined.question.prompt, "Q0");
        let joined_json = serde_json::to_value(&joined).unwrap();
        assert!(joined_json["question"].get("correct_option_index").is_none());

        let ack = submit_answer(&state, "quiz", 42, true, Some(0)).await.unwrap();
        assert_eq!(ack.correct_count, Some(1));

        let reveal = {
            let state = state.clone();
            tokio::spawn(async move { await_reveal(&state, "quiz", 0, None, Some(5_000)).await })
        };
        while state.reveals().waiter_count("quiz") == 0 {
            tokio::task::yield_now().await;
        }

        let first = host_service::advance(&state, "quiz", 1, None).await.unwrap();
        let recap = first.recap.unwrap();
        assert_eq!((recap.index, recap.correct_option_index), (0, 1));
        assert_eq!(first.next_index, Some(1));

        match reveal.await.unwrap().unwrap() {
            RevealResponse::Revealed {
                correct_option_index,
                current_index,
                ..
            } => {
                assert_eq!(correct_option_index, 1);
                assert_eq!(current_index, 1);
            }
            other => panic!("unexpected reveal outcome: {other:?}"),
        }

        let second = host_service::advance(&state, "quiz", 1, None).await.unwrap();
        assert!(!second.game_finished);
        let last = host_service::advance(&state, "quiz", 1, None).await.unwrap();
        assert!(last.game_finished);

        let entries = ledger(&state, "quiz", 1).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].correct_count, 1);
        assert_eq!(entries[0].total_questions, 3);
    }

    #[tokio::test]
    async fn status_hides_answers() {
        let state = fixtures::state_with_quiz("quiz", 1, &[1, 0]).await;
        assert!(matches!(
            session_status(&state, "quiz").await.unwrap_err(),
            ServiceError::NotFound(_)
        ));

        host_service::start(&state, "quiz", 1).await.unwrap();
        let status = session_status(&state, "quiz").await.unwrap();
        assert!(status.is_live);
        assert_eq!(status.total_questions, 2);
        assert!(status.join_code.is_some());
    }
}
