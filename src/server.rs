//! In-memory development backend for the chat REST API.
//!
//! Serves the same routes as the production service under `/api`, with a
//! canned bot reply instead of a model. Used for local development and by the
//! end-to-end tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Router,
};
use chrono::{Local, Utc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::wire::{
    ApiChatSession, ApiMessage, CreateSessionRequest, DeleteResponse, MessageResponse,
    MessagesResponse, SendMessageRequest, SessionResponse, SessionsResponse,
};
use crate::chat::Sender;

struct StoredSession {
    session: ApiChatSession,
    repository_id: String,
    messages: Vec<ApiMessage>,
}

#[derive(Default)]
pub struct DevState {
    // Newest first, like the list the client renders
    order: Vec<String>,
    sessions: HashMap<String, StoredSession>,
}

type SharedState = Arc<Mutex<DevState>>;

#[derive(Clone, Default)]
pub struct DevServer {
    state: SharedState,
}

impl DevServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/chat/sessions", get(list_sessions).post(create_session))
            .route("/chat/sessions/:id", delete(delete_session))
            .route(
                "/chat/sessions/:id/messages",
                get(list_messages).post(send_message),
            )
            .with_state(self.state.clone());

        Router::new()
            .nest("/api", api)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    pub fn session_count(&self) -> usize {
        lock(&self.state).order.len()
    }
}

fn lock(state: &SharedState) -> MutexGuard<'_, DevState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clock_time() -> String {
    Local::now().format("%-I:%M %p").to_string()
}

fn bot_reply(content: &str) -> String {
    format!(
        "You asked: \"{}\". This development server has no model attached, so this is a canned reply.",
        content.trim()
    )
}

async fn list_sessions(State(state): State<SharedState>) -> Json<SessionsResponse> {
    let state = lock(&state);
    let sessions = state
        .order
        .iter()
        .filter_map(|id| state.sessions.get(id))
        .map(|stored| stored.session.clone())
        .collect();
    Json(SessionsResponse { sessions })
}

async fn create_session(
    State(state): State<SharedState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, StatusCode> {
    if request.repository_id.trim().is_empty() {
        warn!("Rejecting session without repository id");
        return Err(StatusCode::BAD_REQUEST);
    }

    let session = ApiChatSession {
        id: Uuid::new_v4().to_string(),
        title: request.title,
        last_message: None,
        timestamp: clock_time(),
        is_active: None,
    };

    let mut state = lock(&state);
    state.order.insert(0, session.id.clone());
    state.sessions.insert(
        session.id.clone(),
        StoredSession {
            session: session.clone(),
            repository_id: request.repository_id,
            messages: Vec::new(),
        },
    );
    info!(
        "Created session {} for repository {}",
        session.id, state.sessions[&session.id].repository_id
    );

    Ok(Json(SessionResponse { session }))
}

async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, StatusCode> {
    let mut state = lock(&state);
    if state.sessions.remove(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    state.order.retain(|s| s != &id);
    info!("Deleted session {}", id);
    Ok(Json(DeleteResponse { success: true }))
}

async fn list_messages(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, StatusCode> {
    let state = lock(&state);
    let stored = state.sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(MessagesResponse {
        messages: stored.messages.clone(),
    }))
}

async fn send_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<MessageResponse>, StatusCode> {
    if request.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut state = lock(&state);
    let stored = state.sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;

    let user = ApiMessage {
        id: Uuid::new_v4().to_string(),
        content: request.content.clone(),
        sender: Sender::User,
        timestamp: Utc::now(),
        session_id: id.clone(),
    };
    let reply = ApiMessage {
        id: Uuid::new_v4().to_string(),
        content: bot_reply(&request.content),
        sender: Sender::Bot,
        timestamp: Utc::now(),
        session_id: id,
    };

    stored.messages.push(user);
    stored.messages.push(reply.clone());
    stored.session.last_message = Some(request.content);
    stored.session.timestamp = clock_time();

    Ok(Json(MessageResponse { message: reply }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> SharedState {
        Arc::new(Mutex::new(DevState::default()))
    }

    async fn create(state: &SharedState, title: &str) -> ApiChatSession {
        let Json(resp) = create_session(
            State(state.clone()),
            Json(CreateSessionRequest {
                title: title.into(),
                repository_id: "repo-1".into(),
            }),
        )
        .await
        .unwrap();
        resp.session
    }

    #[tokio::test]
    async fn test_sessions_listed_newest_first() {
        let state = shared();
        create(&state, "first").await;
        create(&state, "second").await;

        let Json(resp) = list_sessions(State(state.clone())).await;
        let titles: Vec<_> = resp.sessions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_send_stores_both_messages_and_updates_preview() {
        let state = shared();
        let session = create(&state, "chat").await;

        let Json(resp) = send_message(
            State(state.clone()),
            Path(session.id.clone()),
            Json(SendMessageRequest {
                content: "where is main?".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.message.sender, Sender::Bot);

        let Json(msgs) = list_messages(State(state.clone()), Path(session.id.clone()))
            .await
            .unwrap();
        assert_eq!(msgs.messages.len(), 2);
        assert_eq!(msgs.messages[0].sender, Sender::User);

        let Json(list) = list_sessions(State(state)).await;
        assert_eq!(list.sessions[0].last_message.as_deref(), Some("where is main?"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let state = shared();
        let err = list_messages(State(state.clone()), Path("nope".into()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);

        let err = delete_session(State(state), Path("nope".into()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_repository() {
        let result = create_session(
            State(shared()),
            Json(CreateSessionRequest {
                title: "t".into(),
                repository_id: "  ".into(),
            }),
        )
        .await;
        assert_eq!(result.unwrap_err(), StatusCode::BAD_REQUEST);
    }
}
