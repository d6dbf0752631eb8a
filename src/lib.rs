//! Terminal beauty-advisor chat client.
//!
//! Keeps a bounded conversation history on disk, prepends a domain-restricted
//! system prompt personalized with the user's name, and forwards the
//! conversation to a remote chat-completion endpoint.

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod identity;
pub mod logging;
pub mod prompt;
pub mod store;
pub mod view;

pub use client::{CompletionClient, CompletionRequest, HttpCompletionClient};
pub use config::AppConfig;
pub use controller::{
    FailureKind, GenerationSettings, SubmissionController, SubmissionOutcome, SubmissionState,
};
pub use error::{ChatError, Result};
pub use history::{ConversationHistory, Message, Role};
pub use identity::Identity;
pub use view::{BubbleKind, TranscriptView};
