#![allow(dead_code)]

use async_trait::async_trait;
use skincare_chat::controller::GenerationSettings;
use skincare_chat::identity::FixedName;
use skincare_chat::store::{MemoryStore, Store};
use skincare_chat::view::IndicatorId;
use skincare_chat::{
    BubbleKind, ChatError, CompletionClient, CompletionRequest, ConversationHistory, Result,
    SubmissionController, TranscriptView,
};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    LatestQuestion(Option<String>),
    Bubble(BubbleKind, String),
    InputCleared,
    TypingShown,
    TypingRemoved,
}

/// Records everything the controller asks the transcript to do.
#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
    active: Mutex<HashSet<IndicatorId>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn typing_visible(&self) -> bool {
        !self.active.lock().unwrap().is_empty()
    }

    pub fn bubbles(&self) -> Vec<(BubbleKind, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Bubble(kind, text) => Some((kind, text)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl TranscriptView for RecordingView {
    fn append_message(&self, text: &str, kind: BubbleKind) {
        self.push(ViewEvent::Bubble(kind, text.to_string()));
    }

    fn show_typing_indicator(&self) -> IndicatorId {
        let id = IndicatorId::new();
        self.active.lock().unwrap().insert(id.clone());
        self.push(ViewEvent::TypingShown);
        id
    }

    fn remove_typing_indicator(&self, id: &IndicatorId) {
        if self.active.lock().unwrap().remove(id) {
            self.push(ViewEvent::TypingRemoved);
        }
    }

    fn set_latest_question(&self, text: Option<&str>) {
        self.push(ViewEvent::LatestQuestion(text.map(str::to_string)));
    }

    fn clear_input(&self) {
        self.push(ViewEvent::InputCleared);
    }
}

/// Answers requests from a queue and keeps what it was sent.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn replying(replies: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ChatError::EmptyReply))
    }
}

/// A real transport failure, produced without touching the network.
pub async fn transport_error() -> ChatError {
    let err = reqwest::Client::new()
        .post("not a url")
        .send()
        .await
        .unwrap_err();
    ChatError::Transport(err)
}

pub const SETTINGS: GenerationSettings = GenerationSettings {
    max_tokens: 600,
    temperature: 0.2,
};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub view: Arc<RecordingView>,
    pub controller: SubmissionController,
}

pub fn harness(store: Arc<MemoryStore>, name: &str, client: Arc<dyn CompletionClient>) -> Harness {
    let view = Arc::new(RecordingView::default());
    let history = Arc::new(ConversationHistory::load(
        store.clone() as Arc<dyn Store>,
        skincare_chat::history::MAX_HISTORY_MESSAGES,
    ));
    let controller = SubmissionController::new(
        store.clone(),
        history,
        Box::new(FixedName(Some(name.to_string()))),
        client,
        view.clone(),
        SETTINGS,
    );
    Harness {
        store,
        view,
        controller,
    }
}
