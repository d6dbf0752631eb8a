//! Error taxonomy for the chat client.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Malformed persisted data: {0}")]
    MalformedHistory(#[from] serde_json::Error),

    #[error("Server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Completion response contained no usable reply")]
    EmptyReply,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChatError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
