use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::notify::Notification;

#[derive(Debug, Clone)]
pub enum Event {
    /// A user-facing notification (operation failed, chat deleted, ...)
    Notification(Notification),

    /// The session list was replaced or edited
    SessionsChanged,

    /// The message list of the active session changed
    MessagesChanged { session_id: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(Event::SessionsChanged);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(Event::MessagesChanged {
            session_id: Some("s1".into()),
        });

        match rx.recv().await.unwrap() {
            Event::MessagesChanged { session_id } => assert_eq!(session_id.as_deref(), Some("s1")),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
