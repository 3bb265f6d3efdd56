use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::{
    api::ChatApi,
    bus::NotificationLevel,
    chat::{new_session_title, Message, MessageLog, Session, JUST_NOW},
    error::{ApiError, ApiResult, ErrorKind},
    notify::{Notification, Notifier},
};

#[derive(Debug, Default)]
struct StoreState {
    sessions: Vec<Session>,
    messages: MessageLog,
    current_session_id: Option<String>,
    // Counters rather than flags so overlapping loads don't clear each other
    loading_sessions: usize,
    loading_messages: usize,
    sending: bool,
    last_error: Option<ErrorKind>,
}

/// Read-only copy of the store state, for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub sessions: Vec<Session>,
    pub messages: Vec<Message>,
    pub current_session_id: Option<String>,
    pub is_loading_sessions: bool,
    pub is_loading_messages: bool,
    pub is_sending: bool,
    pub last_error: Option<ErrorKind>,
}

/// Chat sessions and the messages of the selected one, kept in sync with the
/// remote chat API.
///
/// The state lock is only held for synchronous mutations, never across a
/// remote call, so independent operations may be in flight at the same time.
pub struct ChatSessionStore {
    api: Arc<dyn ChatApi>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<StoreState>,
}

impl ChatSessionStore {
    pub fn new(
        api: Arc<dyn ChatApi>,
        notifier: Arc<dyn Notifier>,
        initial_session_id: Option<String>,
    ) -> Self {
        let state = StoreState {
            current_session_id: initial_session_id.filter(|id| !id.is_empty()),
            ..Default::default()
        };
        Self {
            api,
            notifier,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        // A panic while holding the lock leaves plain data behind, still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail(&self, kind: ErrorKind, err: &ApiError) {
        error!("{}: {}", kind, err);
        self.state().last_error = Some(kind);
        self.notifier.notify(Notification::error(kind.description()));
    }

    // --- Accessors ---

    pub fn sessions(&self) -> Vec<Session> {
        self.state().sessions.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.to_vec()
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.state().current_session_id.clone()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.state().last_error
    }

    pub fn is_loading_sessions(&self) -> bool {
        self.state().loading_sessions > 0
    }

    pub fn is_loading_messages(&self) -> bool {
        self.state().loading_messages > 0
    }

    pub fn is_sending(&self) -> bool {
        self.state().sending
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state();
        StoreSnapshot {
            sessions: state.sessions.clone(),
            messages: state.messages.to_vec(),
            current_session_id: state.current_session_id.clone(),
            is_loading_sessions: state.loading_sessions > 0,
            is_loading_messages: state.loading_messages > 0,
            is_sending: state.sending,
            last_error: state.last_error,
        }
    }

    /// Sessions whose title contains `term`, ignoring case.
    pub fn search_sessions(&self, term: &str) -> Vec<Session> {
        let term = term.trim();
        self.state()
            .sessions
            .iter()
            .filter(|s| s.matches(term))
            .cloned()
            .collect()
    }

    // --- Operations ---

    /// Initial load: the session list, then the messages of the current
    /// session if one was given at construction.
    pub async fn bootstrap(&self) {
        self.load_sessions().await;
        if let Some(id) = self.current_session_id() {
            self.load_messages(&id).await;
        }
    }

    pub async fn load_sessions(&self) {
        {
            let mut state = self.state();
            state.loading_sessions += 1;
            state.last_error = None;
        }

        let result = self.api.list_sessions().await;

        let loaded = {
            let mut state = self.state();
            state.loading_sessions -= 1;
            match result {
                Ok(api_sessions) => {
                    let current = state.current_session_id.clone();
                    state.sessions = api_sessions
                        .into_iter()
                        .map(Session::from)
                        .map(|mut session| {
                            session.is_active = current.as_deref() == Some(session.id.as_str());
                            session
                        })
                        .collect();
                    debug!("Loaded {} chat sessions", state.sessions.len());
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        match loaded {
            Ok(()) => self.notifier.sessions_changed(),
            Err(e) => self.fail(ErrorKind::LoadSessionsFailed, &e),
        }
    }

    pub async fn refresh_sessions(&self) {
        self.load_sessions().await;
    }

    /// Replace the message list with the server's copy for `session_id`.
    /// The response is dropped if the current session changed meanwhile.
    pub async fn load_messages(&self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }

        let requested_while = {
            let mut state = self.state();
            state.loading_messages += 1;
            state.last_error = None;
            state.current_session_id.clone()
        };

        let result = self.api.list_messages(session_id).await;

        let loaded = {
            let mut state = self.state();
            state.loading_messages -= 1;
            match result {
                Ok(_) if state.current_session_id != requested_while => {
                    debug!(
                        "Discarding messages for {}: current session changed while loading",
                        session_id
                    );
                    return;
                }
                Ok(api_messages) => {
                    state
                        .messages
                        .replace(api_messages.into_iter().map(Message::from).collect());
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        match loaded {
            Ok(()) => self.notifier.messages_changed(Some(session_id)),
            Err(e) => self.fail(ErrorKind::LoadMessagesFailed, &e),
        }
    }

    /// Mark `id` current and active. Returns the session title when it is in
    /// the list.
    fn activate(&self, id: &str) -> Option<String> {
        let title = {
            let mut state = self.state();
            state.current_session_id = Some(id.to_string());
            for session in state.sessions.iter_mut() {
                session.is_active = session.id == id;
            }
            state
                .sessions
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.title.clone())
        };
        self.notifier.sessions_changed();
        title
    }

    /// Make `id` the current session and load its messages. The id is not
    /// checked against the local list.
    pub async fn select_session(&self, id: &str) {
        if let Some(title) = self.activate(id) {
            self.notifier.notify(Notification::new(
                NotificationLevel::Info,
                "Chat session changed",
                format!("Switched to \"{}\"", title),
            ));
        }
        self.load_messages(id).await;
    }

    /// Send `content` to the current session, showing it immediately and
    /// reconciling once the server answers. Ignored without a current session,
    /// for blank content, or while another send is in flight.
    pub async fn send_message(&self, content: &str) {
        if content.trim().is_empty() {
            return;
        }

        let (session_id, temp_id) = {
            let mut state = self.state();
            let Some(session_id) = state.current_session_id.clone() else {
                return;
            };
            if state.sending {
                warn!("A message is already being sent, ignoring new one");
                return;
            }
            state.sending = true;
            let temp_id = state.messages.begin_pending(content);
            (session_id, temp_id)
        };
        self.notifier.messages_changed(Some(&session_id));

        let result = self.api.send_message(&session_id, content).await;

        let sent = {
            let mut state = self.state();
            state.sending = false;
            match result {
                Ok(reply) => {
                    if state.current_session_id.as_deref() == Some(session_id.as_str()) {
                        if !state.messages.confirm_pending(&temp_id, Message::from(reply)) {
                            debug!("Message list was reloaded during send, reply not appended");
                        }
                    } else {
                        state.messages.rollback_pending(&temp_id);
                        debug!("Session changed during send, reply for {} not shown", session_id);
                    }
                    if let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) {
                        session.last_message = Some(content.to_string());
                        session.timestamp = JUST_NOW.to_string();
                    }
                    Ok(())
                }
                Err(e) => {
                    state.messages.rollback_pending(&temp_id);
                    Err(e)
                }
            }
        };

        match sent {
            Ok(()) => self.notifier.sessions_changed(),
            Err(e) => self.fail(ErrorKind::SendFailed, &e),
        }
        self.notifier.messages_changed(Some(&session_id));
    }

    /// Create a session for `repository_id` and make it current. Unlike the
    /// other operations the failure is also returned to the caller.
    pub async fn create_session(&self, repository_id: &str) -> ApiResult<Session> {
        let title = new_session_title();

        let api_session = match self.api.create_session(&title, repository_id).await {
            Ok(s) => s,
            Err(e) => {
                self.fail(ErrorKind::CreateFailed, &e);
                return Err(e);
            }
        };

        let mut session = Session::from(api_session);
        session.is_active = true;

        {
            let mut state = self.state();
            for other in state.sessions.iter_mut() {
                other.is_active = false;
            }
            state.sessions.insert(0, session.clone());
            state.current_session_id = Some(session.id.clone());
            state.messages.clear();
        }

        info!(
            "Created chat session {} for repository {}",
            session.id, repository_id
        );
        self.notifier.sessions_changed();
        self.notifier.messages_changed(Some(&session.id));

        Ok(session)
    }

    /// Delete a session remotely, then locally. Deleting the current session
    /// moves to the first remaining one, or clears the selection.
    pub async fn delete_session(&self, id: &str) {
        if let Err(e) = self.api.delete_session(id).await {
            self.fail(ErrorKind::DeleteFailed, &e);
            return;
        }

        let next = {
            let mut state = self.state();
            state.sessions.retain(|s| s.id != id);
            if state.current_session_id.as_deref() == Some(id) {
                let next = state.sessions.first().map(|s| s.id.clone());
                if next.is_none() {
                    state.current_session_id = None;
                    state.messages.clear();
                }
                next
            } else {
                None
            }
        };

        info!("Deleted chat session {}", id);
        self.notifier.sessions_changed();
        self.notifier.notify(Notification::new(
            NotificationLevel::Success,
            "Chat deleted",
            "The conversation has been removed",
        ));

        match next {
            Some(next_id) => {
                self.activate(&next_id);
                self.load_messages(&next_id).await;
            }
            None => self.notifier.messages_changed(self.current_session_id().as_deref()),
        }
    }
}
