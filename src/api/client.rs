use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::api::wire::{
    ApiChatSession, ApiMessage, CreateSessionRequest, DeleteResponse, MessageResponse,
    MessagesResponse, SendMessageRequest, SessionResponse, SessionsResponse,
};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};

/// The remote chat service as seen by the store.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_sessions(&self) -> ApiResult<Vec<ApiChatSession>>;

    async fn create_session(&self, title: &str, repository_id: &str) -> ApiResult<ApiChatSession>;

    /// Ok only when the server confirms the deletion.
    async fn delete_session(&self, session_id: &str) -> ApiResult<()>;

    async fn list_messages(&self, session_id: &str) -> ApiResult<Vec<ApiMessage>>;

    /// Returns the bot's reply. The user's own message is not echoed back.
    async fn send_message(&self, session_id: &str, content: &str) -> ApiResult<ApiMessage>;
}

pub struct HttpChatApi {
    client: Client,
    base_url: Url,
}

impl HttpChatApi {
    pub fn new(config: &Config) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Self::with_client(client, &config.api_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::InvalidUrl(base_url.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// Client with default timeouts, mostly for tests and tooling.
    pub fn with_base_url(base_url: &str) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Self::with_client(client, base_url)
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn sessions_url(&self) -> Url {
        self.endpoint(&["chat", "sessions"])
    }

    fn session_url(&self, session_id: &str) -> Url {
        self.endpoint(&["chat", "sessions", session_id])
    }

    fn messages_url(&self, session_id: &str) -> Url {
        self.endpoint(&["chat", "sessions", session_id, "messages"])
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request.send().await.map_err(|e| {
            debug!("Chat API request failed: {}", e);
            ApiError::from(e)
        })?;

        let status = response.status();
        let url = response.url().to_string();
        debug!("<- {} {}", status, url);

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_sessions(&self) -> ApiResult<Vec<ApiChatSession>> {
        let body: SessionsResponse = self.execute(self.client.get(self.sessions_url())).await?;
        Ok(body.sessions)
    }

    async fn create_session(&self, title: &str, repository_id: &str) -> ApiResult<ApiChatSession> {
        let payload = CreateSessionRequest {
            title: title.to_string(),
            repository_id: repository_id.to_string(),
        };
        let body: SessionResponse = self
            .execute(self.client.post(self.sessions_url()).json(&payload))
            .await?;
        Ok(body.session)
    }

    async fn delete_session(&self, session_id: &str) -> ApiResult<()> {
        let body: DeleteResponse = self
            .execute(self.client.delete(self.session_url(session_id)))
            .await?;

        if !body.success {
            return Err(ApiError::Rejected(format!(
                "server declined to delete session {}",
                session_id
            )));
        }
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> ApiResult<Vec<ApiMessage>> {
        let body: MessagesResponse = self
            .execute(self.client.get(self.messages_url(session_id)))
            .await?;
        Ok(body.messages)
    }

    async fn send_message(&self, session_id: &str, content: &str) -> ApiResult<ApiMessage> {
        let payload = SendMessageRequest {
            content: content.to_string(),
        };
        let body: MessageResponse = self
            .execute(self.client.post(self.messages_url(session_id)).json(&payload))
            .await?;
        Ok(body.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let api = HttpChatApi::with_base_url("http://localhost:8000/api/").unwrap();
        assert_eq!(
            api.sessions_url().as_str(),
            "http://localhost:8000/api/chat/sessions"
        );
        assert_eq!(
            api.messages_url("s1").as_str(),
            "http://localhost:8000/api/chat/sessions/s1/messages"
        );
        assert_eq!(
            api.session_url("s1").as_str(),
            "http://localhost:8000/api/chat/sessions/s1"
        );
    }

    #[test]
    fn test_reserved_characters_in_session_id_are_escaped() {
        let api = HttpChatApi::with_base_url("http://localhost:8000/api").unwrap();

        let url = api.messages_url("a?b");
        assert_eq!(url.path(), "/api/chat/sessions/a%3Fb/messages");
        assert_eq!(url.query(), None);

        assert_eq!(
            api.messages_url("x/y").path(),
            "/api/chat/sessions/x%2Fy/messages"
        );

        let url = api.session_url("c#d");
        assert_eq!(url.path(), "/api/chat/sessions/c%23d");
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(matches!(
            HttpChatApi::with_base_url("mailto:buddy@example.com"),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(HttpChatApi::with_base_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) on loopback is not expected to accept HTTP.
        let api = HttpChatApi::with_base_url("http://127.0.0.1:9/api").unwrap();
        let err = api.list_sessions().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
