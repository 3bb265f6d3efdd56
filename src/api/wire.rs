use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{DeliveryStatus, Message, Sender, Session};

// REST payload types. Field names follow the server (snake_case), except
// `repositoryId` in the create request.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiChatSession {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<ApiChatSession>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: ApiChatSession,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: ApiMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub title: String,
    #[serde(rename = "repositoryId")]
    pub repository_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

// Wire -> domain. Nothing else in the crate reads the wire shapes.

impl From<ApiChatSession> for Session {
    fn from(api: ApiChatSession) -> Self {
        Self {
            id: api.id,
            title: api.title,
            last_message: api.last_message,
            timestamp: api.timestamp,
            is_active: api.is_active.unwrap_or(false),
        }
    }
}

impl From<ApiMessage> for Message {
    fn from(api: ApiMessage) -> Self {
        Self {
            id: api.id,
            content: api.content,
            sender: api.sender,
            timestamp: api.timestamp,
            status: DeliveryStatus::Confirmed,
        }
    }
}
