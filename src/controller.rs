//! Orchestrates one user-submit cycle.
//!
//! `Idle -> Validating -> AwaitingIdentity (first run) -> Sending ->
//! AwaitingResponse -> Succeeded | Failed -> Idle`. Only a reply with usable
//! text is added to history; every failure renders a generic notice and
//! leaves the detail to the log.
use crate::client::{CompletionClient, CompletionRequest};
use crate::config::EndpointParams;
use crate::error::ChatError;
use crate::history::{ConversationHistory, Message, Role};
use crate::identity::{resolve_identity, Identity, IdentityProvider};
use crate::prompt;
use crate::store::Store;
use crate::view::{BubbleKind, TranscriptView, TypingIndicator};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{info, instrument, warn};

pub const NO_REPLY_NOTICE: &str = "Sorry, I didn't get a reply. Please try asking again.";
pub const SERVER_ERROR_NOTICE: &str =
    "Sorry, something went wrong on our side. Please try again in a moment.";
pub const NETWORK_ERROR_NOTICE: &str =
    "Sorry, I couldn't reach the advisor. Please check your connection and try again.";
pub const CANCELLED_NOTICE: &str = "Request cancelled.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Validating,
    AwaitingIdentity,
    Sending,
    AwaitingResponse,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoReply,
    ServerError,
    NetworkError,
}

impl FailureKind {
    pub fn notice(&self) -> &'static str {
        match self {
            FailureKind::NoReply => NO_REPLY_NOTICE,
            FailureKind::ServerError => SERVER_ERROR_NOTICE,
            FailureKind::NetworkError => NETWORK_ERROR_NOTICE,
        }
    }

    fn classify(error: &ChatError) -> Self {
        match error {
            ChatError::Http { .. } => FailureKind::ServerError,
            ChatError::EmptyReply | ChatError::MalformedHistory(_) => FailureKind::NoReply,
            ChatError::Transport(_) | ChatError::Persistence(_) | ChatError::Config(_) => {
                FailureKind::NetworkError
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Blank input; nothing happened.
    Ignored,
    Replied(String),
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl From<&EndpointParams> for GenerationSettings {
    fn from(params: &EndpointParams) -> Self {
        Self {
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        }
    }
}

struct Progress {
    state: SubmissionState,
    in_flight: usize,
}

impl Progress {
    /// `Idle` once nothing is in flight, otherwise back to waiting on the
    /// remaining requests.
    fn settle(&mut self) {
        self.state = if self.in_flight == 0 {
            SubmissionState::Idle
        } else {
            SubmissionState::AwaitingResponse
        };
    }
}

fn lock_progress(progress: &Mutex<Progress>) -> MutexGuard<'_, Progress> {
    progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Counts a submission as in flight until it finishes or its future is
/// dropped. The last one out returns the controller to `Idle`.
struct InFlight<'a>(&'a Mutex<Progress>);

impl<'a> InFlight<'a> {
    fn enter(progress: &'a Mutex<Progress>) -> Self {
        lock_progress(progress).in_flight += 1;
        Self(progress)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut progress = lock_progress(self.0);
        progress.in_flight = progress.in_flight.saturating_sub(1);
        progress.settle();
    }
}

pub struct SubmissionController {
    store: Arc<dyn Store>,
    history: Arc<ConversationHistory>,
    identity_provider: Box<dyn IdentityProvider + Send + Sync>,
    identity: OnceLock<Identity>,
    client: Arc<dyn CompletionClient>,
    view: Arc<dyn TranscriptView>,
    settings: GenerationSettings,
    progress: Mutex<Progress>,
}

impl SubmissionController {
    pub fn new(
        store: Arc<dyn Store>,
        history: Arc<ConversationHistory>,
        identity_provider: Box<dyn IdentityProvider + Send + Sync>,
        client: Arc<dyn CompletionClient>,
        view: Arc<dyn TranscriptView>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            store,
            history,
            identity_provider,
            identity: OnceLock::new(),
            client,
            view,
            settings,
            progress: Mutex::new(Progress {
                state: SubmissionState::Idle,
                in_flight: 0,
            }),
        }
    }

    /// The latest transition. Stays `AwaitingResponse` while any
    /// overlapping submission is still waiting on its reply.
    pub fn state(&self) -> SubmissionState {
        lock_progress(&self.progress).state
    }

    fn set_state(&self, state: SubmissionState) {
        lock_progress(&self.progress).state = state;
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// The user's identity, prompting for it on first use.
    pub fn identity(&self) -> &Identity {
        self.identity.get_or_init(|| {
            let previous = self.state();
            self.set_state(SubmissionState::AwaitingIdentity);
            let identity = resolve_identity(self.store.as_ref(), self.identity_provider.as_ref());
            self.set_state(previous);
            identity
        })
    }

    /// Shows the stored conversation, or greets a fresh one with a welcome
    /// message that is added to history.
    pub fn init(&self) {
        let identity = self.identity().clone();
        self.view.set_latest_question(None);

        let messages = self.history.messages();
        if messages.is_empty() {
            let welcome = prompt::welcome_message(&identity);
            self.history.append(Message::assistant(welcome.clone()));
            self.view.append_message(&welcome, BubbleKind::Assistant);
            info!("Started a new conversation");
            return;
        }

        for message in &messages {
            let kind = match message.role {
                Role::User => BubbleKind::User,
                _ => BubbleKind::Assistant,
            };
            self.view.append_message(&message.content, kind);
        }
        info!(count = messages.len(), "Restored conversation");
    }

    /// Drops the stored conversation (identity is kept) and starts over.
    pub fn clear_history(&self) {
        self.history.clear();
        self.init();
    }

    #[instrument(skip(self, input), fields(input_len = input.len()))]
    pub async fn submit(&self, input: &str) -> SubmissionOutcome {
        self.set_state(SubmissionState::Validating);
        let question = input.trim();
        if question.is_empty() {
            lock_progress(&self.progress).settle();
            return SubmissionOutcome::Ignored;
        }
        let identity = self.identity().clone();
        let _in_flight = InFlight::enter(&self.progress);

        self.set_state(SubmissionState::Sending);
        self.view.set_latest_question(Some(question));
        self.view.append_message(question, BubbleKind::User);
        let history = self.history.append(Message::user(question));
        self.view.clear_input();
        let indicator = TypingIndicator::show(self.view.clone());

        let request = CompletionRequest {
            messages: prompt::build(&identity, &history),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        self.set_state(SubmissionState::AwaitingResponse);
        let result = self.client.complete(&request).await;
        indicator.dismiss();

        match result {
            Ok(reply) => {
                self.view.append_message(&reply, BubbleKind::Assistant);
                self.history.append(Message::assistant(reply.clone()));
                self.set_state(SubmissionState::Succeeded);
                info!(reply_len = reply.len(), "Received assistant reply");
                SubmissionOutcome::Replied(reply)
            }
            Err(e) => {
                let kind = FailureKind::classify(&e);
                warn!(error = %e, failure = ?kind, "Submission failed");
                self.view.append_message(kind.notice(), BubbleKind::Notice);
                self.set_state(SubmissionState::Failed);
                SubmissionOutcome::Failed(kind)
            }
        }
    }
}
