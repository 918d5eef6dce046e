//! HTTP implementation of the chat transport

use super::types::{
    Agent, AgentList, ChatRequest, CreateSessionRequest, Session, SessionWithMessages,
};
use super::{ApiError, ApiErrorKind, ByteStream, ChatTransport};
use crate::config::ClientConfig;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

/// Chat API client. Attaches the api key to every request.
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL plus path segments, each percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let invalid = |detail: String| {
            ApiError::new(
                ApiErrorKind::InvalidRequest,
                format!("Invalid base URL {}: {detail}", self.config.api_base_url),
            )
        };
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("api-key", &self.config.api_key)
            .header("accept", "application/json")
    }

    /// Send and fail on non-2xx, carrying the server's `detail`
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), &body))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(ApiError::missing_body());
        }
        serde_json::from_str(&body)
            .map_err(|e| ApiError::decode(format!("Failed to parse response: {e} - body: {body}")))
    }

    /// Agents visible to this api key
    pub async fn list_agents(&self) -> Result<Vec<Agent>, ApiError> {
        let response = self.execute(self.client.get(self.url(&["chat", "agents"])?)).await?;
        let list: AgentList = Self::json(response).await?;
        Ok(list.agents)
    }

    /// Sessions owned by this api key
    pub async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let response = self.execute(self.client.get(self.url(&["sessions"])?)).await?;
        Self::json(response).await
    }
}

#[async_trait]
impl ChatTransport for ApiClient {
    async fn create_session(&self) -> Result<Session, ApiError> {
        let request = self
            .client
            .post(self.url(&["sessions"])?)
            .json(&CreateSessionRequest::default());
        let response = self.execute(request).await?;
        Self::json(response).await
    }

    async fn send_message(
        &self,
        content: &str,
        session_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<ByteStream, ApiError> {
        let url = self.url(&["chat", "agents", self.config.agent_id.as_str()])?;
        let request = self.client.post(url).json(&ChatRequest {
            message: content,
            session_id,
            context,
        });
        let response = self.execute(request).await?;

        // Streaming needs a body; an explicitly empty one is a failed send
        if response.content_length() == Some(0) {
            return Err(ApiError::missing_body());
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed())
    }

    async fn get_session_with_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionWithMessages, ApiError> {
        let url = self.url(&["sessions", session_id, "with-messages"])?;
        let request = self.client.get(url);
        let response = self.execute(request).await?;
        Self::json(response).await
    }
}
