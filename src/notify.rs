//! User-facing notifications
//!
//! The store never talks to a UI directly. It reports outcomes through a
//! [`Notifier`], which a front end implements or subscribes to via the bus.

use tracing::{error, info, warn};

use crate::bus::{Event, EventBus, NotificationLevel};

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, "Error", description)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    /// Called after the session list was mutated.
    fn sessions_changed(&self) {}

    /// Called after the message list was mutated.
    fn messages_changed(&self, _session_id: Option<&str>) {}
}

impl Notifier for EventBus {
    fn notify(&self, notification: Notification) {
        self.publish(Event::Notification(notification));
    }

    fn sessions_changed(&self) {
        self.publish(Event::SessionsChanged);
    }

    fn messages_changed(&self, session_id: Option<&str>) {
        self.publish(Event::MessagesChanged {
            session_id: session_id.map(str::to_string),
        });
    }
}

/// Writes notifications to the log only. Used when no front end is attached.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Error => error!("{}: {}", n.title, n.description),
            NotificationLevel::Warning => warn!("{}: {}", n.title, n.description),
            NotificationLevel::Info | NotificationLevel::Success => {
                info!("{}: {}", n.title, n.description)
            }
        }
    }
}
