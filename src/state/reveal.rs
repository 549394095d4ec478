//! Waiter registry letting players park until the host moves past the question they answered.
//!
//! Each session with pending waiters owns one `watch` channel. Registering subscribes to it
//! before the caller reads the store, and every accepted transition publishes the new record
//! afterwards, so a change can never fall between the read and the wait. Waiters are plain
//! receivers: they hold no task or connection of their own and are released on drop.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{sync::watch, time::timeout};

use crate::dao::models::SessionEntity;

/// Compact view of a session record as seen by waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSignal {
    /// Run of the session when the record was written.
    pub run: i64,
    /// Whether the run is in progress.
    pub is_live: bool,
    /// Active question or -1.
    pub current_index: i32,
    /// Record version.
    pub version: i64,
}

impl From<&SessionEntity> for SessionSignal {
    fn from(value: &SessionEntity) -> Self {
        Self {
            run: value.run,
            is_live: value.is_live,
            current_index: value.current_index,
            version: value.version,
        }
    }
}

impl SessionSignal {
    /// Whether this record no longer shows `observed_index` as the active question of `run`.
    pub fn moved_past(&self, run: i64, observed_index: i32) -> bool {
        !(self.is_live && self.run == run && self.current_index == observed_index)
    }
}

type Channels = DashMap<String, watch::Sender<Option<SessionSignal>>>;

/// Registry of reveal waiters keyed by session id.
#[derive(Default)]
pub struct RevealHub {
    channels: Arc<Channels>,
}

impl RevealHub {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `session_id`. Must happen before the caller reads the store.
    pub fn register(&self, session_id: &str) -> RevealWaiter {
        let receiver = self
            .channels
            .entry(session_id.to_owned())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();

        RevealWaiter {
            session_id: session_id.to_owned(),
            receiver: Some(receiver),
            channels: Arc::clone(&self.channels),
        }
    }

    /// Wake the waiters of a session after its record was written.
    ///
    /// Older versions never overwrite newer ones, so concurrent publishers cannot move a
    /// waiter's view backwards.
    pub fn publish(&self, session: &SessionEntity) {
        let Some(sender) = self.channels.get(&session.session_id) else {
            return;
        };
        let signal = SessionSignal::from(session);
        sender.send_if_modified(|current| match current {
            Some(existing) if existing.version >= signal.version => false,
            _ => {
                *current = Some(signal);
                true
            }
        });
    }

    /// Number of waiters currently registered for `session_id`.
    pub fn waiter_count(&self, session_id: &str) -> usize {
        self.channels
            .get(session_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of sessions holding a channel.
    pub fn session_count(&self) -> usize {
        self.channels.len()
    }
}

/// One pending "tell me when the question changes" registration.
pub struct RevealWaiter {
    session_id: String,
    receiver: Option<watch::Receiver<Option<SessionSignal>>>,
    channels: Arc<Channels>,
}

impl RevealWaiter {
    /// Suspend until a record newer than `seen_version` shows the session moved past
    /// `observed_index` of `run`, or until `limit` elapses. Returns the waking signal.
    pub async fn wait_moved(
        &mut self,
        run: i64,
        observed_index: i32,
        seen_version: i64,
        limit: Duration,
    ) -> Option<SessionSignal> {
        let receiver = self.receiver.as_mut()?;
        let wait = async {
            receiver
                .wait_for(|signal| {
                    signal.is_some_and(|signal| {
                        signal.version > seen_version && signal.moved_past(run, observed_index)
                    })
                })
                .await
                .ok()
                .and_then(|signal| *signal)
        };

        timeout(limit, wait).await.ok().flatten()
    }
}

impl Drop for RevealWaiter {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.channels
            .remove_if(&self.session_id, |_, sender| sender.receiver_count() == 0);
    }
}
