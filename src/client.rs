//! Remote completion endpoint: request payload, response schema, HTTP client.
use crate::config::EndpointParams;
use crate::error::{ChatError, Result};
use crate::history::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
}

// --- Response structures ---

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pulls `choices[0].message.content`, trimmed. Anything unusable is
/// [`ChatError::EmptyReply`].
pub fn extract_reply(body: &str) -> Result<String> {
    let response: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, body, "Completion response was not valid JSON");
        ChatError::EmptyReply
    })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(ChatError::EmptyReply)
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends one request and returns the assistant's reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

pub struct HttpCompletionClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(params: &EndpointParams) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = params.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            http: builder.build()?,
            url: params.url.clone(),
            api_key: params.api_key.clone().filter(|key| !key.is_empty()),
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    #[instrument(skip(self, request), fields(url = %self.url, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut builder = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, "Completion request failed to complete");
            ChatError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            // The status alone decides the failure; the body is only for the log.
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Completion endpoint returned an error");
            return Err(ChatError::http(status.as_u16(), body));
        }

        let body = response.text().await.map_err(|e| {
            error!(status = status.as_u16(), error = %e, "Failed to read completion response");
            ChatError::EmptyReply
        })?;

        debug!(status = status.as_u16(), bytes = body.len(), "Received completion response");
        extract_reply(&body)
    }
}
