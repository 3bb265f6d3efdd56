use std::net::SocketAddr;
use std::sync::Arc;

use codebuddy::api::HttpChatApi;
use codebuddy::bus::{Event, EventBus, NotificationLevel};
use codebuddy::chat::Sender;
use codebuddy::error::ErrorKind;
use codebuddy::server::DevServer;
use codebuddy::ChatSessionStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct Backend {
    addr: SocketAddr,
    server: DevServer,
    task: JoinHandle<()>,
}

impl Backend {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind dev server listener");
        let addr = listener.local_addr().expect("get dev server address");

        let server = DevServer::new();
        let app = server.router();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("dev server");
        });

        Self { addr, server, task }
    }

    fn store(&self, initial: Option<&str>, bus: Arc<EventBus>) -> ChatSessionStore {
        let api = HttpChatApi::with_base_url(&format!("http://{}/api", self.addr))
            .expect("build api client");
        ChatSessionStore::new(Arc::new(api), bus, initial.map(str::to_string))
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[tokio::test]
async fn create_send_and_reload_round_trip() {
    let backend = Backend::spawn().await;
    let store = backend.store(None, Arc::new(EventBus::new()));

    store.bootstrap().await;
    assert!(store.sessions().is_empty());

    let session = store.create_session("repo-1").await.expect("create session");
    assert_eq!(backend.server.session_count(), 1);

    store.send_message("Where is the entry point?").await;
    let messages = store.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[1].sender, Sender::Bot);
    assert!(messages.iter().all(|m| !m.is_pending()));
    assert_eq!(store.last_error(), None);

    // A fresh client sees what the server stored
    let reopened = backend.store(Some(&session.id), Arc::new(EventBus::new()));
    reopened.bootstrap().await;

    let sessions = reopened.sessions();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_active);
    assert_eq!(
        sessions[0].last_message.as_deref(),
        Some("Where is the entry point?")
    );
    assert_eq!(reopened.messages().len(), 2);
}

#[tokio::test]
async fn missing_session_surfaces_load_messages_failed() {
    let backend = Backend::spawn().await;
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    let store = backend.store(None, bus);

    store.select_session("does-not-exist").await;

    assert_eq!(store.current_session_id().as_deref(), Some("does-not-exist"));
    assert_eq!(store.last_error(), Some(ErrorKind::LoadMessagesFailed));
    assert!(store.messages().is_empty());

    let mut saw_error = false;
    while let Ok(event) = rx.try_recv() {
        if let Event::Notification(n) = event {
            saw_error |= n.level == NotificationLevel::Error;
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn deleting_sessions_moves_selection() {
    let backend = Backend::spawn().await;
    let store = backend.store(None, Arc::new(EventBus::new()));

    let first = store.create_session("repo-1").await.expect("create first");
    let second = store.create_session("repo-1").await.expect("create second");
    assert_eq!(store.current_session_id(), Some(second.id.clone()));

    store.delete_session(&second.id).await;
    assert_eq!(store.current_session_id(), Some(first.id.clone()));
    assert!(store.sessions()[0].is_active);

    store.delete_session(&first.id).await;
    assert_eq!(store.current_session_id(), None);
    assert!(store.sessions().is_empty());
    assert_eq!(backend.server.session_count(), 0);

    // Already gone on the server: 404, local state untouched
    store.delete_session(&first.id).await;
    assert_eq!(store.last_error(), Some(ErrorKind::DeleteFailed));
}

#[tokio::test]
async fn reserved_characters_in_session_ids_stay_in_one_path_segment() {
    use codebuddy::api::ChatApi;
    use codebuddy::error::ApiError;

    let backend = Backend::spawn().await;
    let api = HttpChatApi::with_base_url(&format!("http://{}/api", backend.addr))
        .expect("build api client");

    // Each id reaches the messages route and is rejected as an unknown session,
    // rather than being split into a query string or extra path segments
    for id in ["a?b", "x/y", "c#d"] {
        match api.list_messages(id).await {
            Err(ApiError::Status { status, url }) => {
                assert_eq!(status, 404, "unexpected status for {}", id);
                assert!(url.ends_with("/messages"), "unexpected url {}", url);
            }
            other => panic!("expected 404 for {}, got {:?}", id, other.map(|m| m.len())),
        }
    }
}
