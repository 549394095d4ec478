use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent, error::ServiceError, services::sse_events, state::SharedState,
};

/// A fresh subscription to one session stream.
#[derive(Debug)]
pub struct SessionSubscription {
    /// Delivered to this subscriber only, ahead of broadcast events.
    pub handshake: Option<ServerEvent>,
    /// Broadcast events of the session.
    pub receiver: broadcast::Receiver<ServerEvent>,
}

/// Subscribe to the event stream of an existing session.
pub async fn subscribe_session(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionSubscription, ServiceError> {
    let store = state.require_session_store().await?;
    if store.find_session(session_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!(
            "session `{session_id}` not found"
        )));
    }

    let receiver = state.events().subscribe(session_id);
    let handshake = sse_events::handshake_event(state, session_id).await;
    Ok(SessionSubscription {
        handshake,
        receiver,
    })
}

/// Convert a subscription into an SSE response, sending its handshake first,
/// forwarding events and cleaning up once the client disconnects.
pub fn to_sse_stream(
    subscription: SessionSubscription,
    session_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let SessionSubscription {
        handshake,
        mut receiver,
    } = subscription;
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(handshake) = handshake {
            if tx.send(Ok(to_event(handshake))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(session_id = %session_id, skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(session_id = %session_id, "session SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::SessionEntity,
            quiz_repository::InMemoryQuizRepository,
            session_store::{SessionStore, memory::InMemorySessionStore},
        },
        services::{fixtures, host_service},
        state::{AppState, Backend},
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn subscribing_requires_an_existing_session() {
        let sessions = Arc::new(InMemorySessionStore::new());
        sessions
            .create_session(SessionEntity::idle("quiz".into(), 1))
            .await
            .unwrap();
        let state = AppState::with_backend(
            AppConfig::default(),
            Backend {
                sessions,
                quizzes: Arc::new(InMemoryQuizRepository::default()),
            },
        )
        .await;

        let err = subscribe_session(&state, "missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let mut subscription = subscribe_session(&state, "quiz").await.unwrap();
        let handshake = subscription.handshake.take().unwrap();
        assert_eq!(handshake.event.as_deref(), Some("handshake"));
        assert!(handshake.data.contains("\"degraded\":false"));
        assert!(matches!(
            subscription.receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn new_subscribers_do_not_crowd_out_transitions() {
        let state = fixtures::state_with_quiz("quiz", 1, &[0, 1, 2]).await;
        host_service::start(&state, "quiz", 1).await.unwrap();

        let mut first = subscribe_session(&state, "quiz").await.unwrap();
        host_service::advance(&state, "quiz", 1, None).await.unwrap();

        let mut viewers = Vec::new();
        for _ in 0..state.config().events_capacity + 6 {
            let viewer = subscribe_session(&state, "quiz").await.unwrap();
            assert!(viewer.handshake.is_some());
            viewers.push(viewer);
        }

        let event = first.receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("question.changed"));
        assert!(event.data.contains("\"current_index\":1"));
        assert!(matches!(
            first.receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
