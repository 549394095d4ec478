use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Per-session SSE hubs, created on first subscription.
pub struct SessionEventHubs {
    hubs: DashMap<String, SseHub>,
    capacity: usize,
}

impl SessionEventHubs {
    /// Build the registry; each hub buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Register a new subscriber for `session_id`.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(session_id.to_owned())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Send an event to the subscribers of `session_id`, dropping the hub once nobody listens.
    pub fn broadcast(&self, session_id: &str, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(session_id) {
            hub.broadcast(event);
        }
        self.hubs
            .remove_if(session_id, |_, hub| hub.subscriber_count() == 0);
    }

    /// Number of sessions with a live hub.
    pub fn session_count(&self) -> usize {
        self.hubs.len()
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> ServerEvent {
        ServerEvent::new(Some(name.to_string()), "{}".into())
    }

    #[tokio::test]
    async fn events_reach_only_their_session() {
        let hubs = SessionEventHubs::new(8);
        let mut quiz = hubs.subscribe("quiz");
        let mut other = hubs.subscribe("other");

        hubs.broadcast("quiz", event("question.changed"));
        assert_eq!(
            quiz.recv().await.unwrap().event.as_deref(),
            Some("question.changed")
        );
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn hubs_without_subscribers_are_dropped() {
        let hubs = SessionEventHubs::new(8);
        let receiver = hubs.subscribe("quiz");
        assert_eq!(hubs.session_count(), 1);

        drop(receiver);
        hubs.broadcast("quiz", event("session.ended"));
        assert_eq!(hubs.session_count(), 0);
    }
}
