use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Preview timestamp shown on a session right after a message was exchanged.
pub const JUST_NOW: &str = "Just now";

const TEMP_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Shown optimistically, not yet confirmed by the server
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl Message {
    #[cfg(test)]
    pub fn confirmed(id: impl Into<String>, content: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            status: DeliveryStatus::Confirmed,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }

    /// Local wall-clock time, hours and minutes.
    pub fn display_time(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub last_message: Option<String>,
    pub timestamp: String,
    pub is_active: bool,
}

impl Session {
    pub fn matches(&self, term: &str) -> bool {
        self.title.to_lowercase().contains(&term.to_lowercase())
    }
}

/// Default title for a freshly created conversation.
pub fn new_session_title() -> String {
    format!("New Conversation {}", Local::now().format("%-I:%M:%S %p"))
}

/// Message list of the active session.
///
/// Optimistic sends go through two explicit phases: [`MessageLog::begin_pending`]
/// appends a user message under a temporary id which also serves as the
/// correlation id, then exactly one of [`MessageLog::confirm_pending`] or
/// [`MessageLog::rollback_pending`] resolves it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[Message] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.entries.clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.entries = messages;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|m| m.is_pending()).count()
    }

    /// Append a user message that has not been confirmed yet. Returns its
    /// temporary id.
    pub fn begin_pending(&mut self, content: &str) -> String {
        let temp_id = format!("{}{}", TEMP_PREFIX, Uuid::new_v4().simple());
        self.entries.push(Message {
            id: temp_id.clone(),
            content: content.to_string(),
            sender: Sender::User,
            timestamp: Utc::now(),
            status: DeliveryStatus::Pending,
        });
        temp_id
    }

    /// Swap the pending entry for a confirmed copy under a fresh id, followed by
    /// the reply. Returns false if `temp_id` was no longer present (the list was
    /// replaced while the send was in flight); nothing is appended then.
    pub fn confirm_pending(&mut self, temp_id: &str, reply: Message) -> bool {
        let Some(pos) = self.entries.iter().position(|m| m.id == temp_id) else {
            return false;
        };
        let mut confirmed = self.entries.remove(pos);
        confirmed.id = Uuid::new_v4().to_string();
        confirmed.status = DeliveryStatus::Confirmed;
        self.entries.push(confirmed);
        self.entries.push(reply);
        true
    }

    pub fn rollback_pending(&mut self, temp_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|m| m.id != temp_id);
        self.entries.len() != before
    }
}
