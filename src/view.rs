//! Transcript rendering boundary and the terminal implementation.
use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::{Print, Stylize},
    terminal::{Clear, ClearType},
};
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

/// Visual class of a transcript bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    User,
    Assistant,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorId(Uuid);

impl IndicatorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IndicatorId {
    fn default() -> Self {
        Self::new()
    }
}

pub trait TranscriptView: Send + Sync {
    /// Appends a bubble. `text` is plain text, never markup.
    fn append_message(&self, text: &str, kind: BubbleKind);
    fn show_typing_indicator(&self) -> IndicatorId;
    /// Must tolerate ids that were already removed.
    fn remove_typing_indicator(&self, id: &IndicatorId);
    fn set_latest_question(&self, text: Option<&str>);
    fn clear_input(&self) {}
}

/// A visible typing indicator. Removed exactly once, on [`dismiss`] or drop.
///
/// [`dismiss`]: TypingIndicator::dismiss
pub struct TypingIndicator {
    view: Arc<dyn TranscriptView>,
    id: Option<IndicatorId>,
}

impl TypingIndicator {
    pub fn show(view: Arc<dyn TranscriptView>) -> Self {
        let id = view.show_typing_indicator();
        Self { view, id: Some(id) }
    }

    pub fn dismiss(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.view.remove_typing_indicator(&id);
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.release();
    }
}

/// Strips control characters other than newline and tab.
pub fn plain_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

// --- Terminal view ---

struct TerminalState<W> {
    out: W,
    active_indicators: HashSet<IndicatorId>,
}

pub struct TerminalView<W: Write + Send = io::Stdout> {
    state: Mutex<TerminalState<W>>,
}

impl TerminalView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(TerminalState {
                out,
                active_indicators: HashSet::new(),
            }),
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut TerminalState<W>) -> io::Result<()>) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = f(&mut *state).and_then(|_| state.out.flush()) {
            warn!(error = %e, "Failed to write to terminal");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .out
    }
}

impl<W: Write + Send> TranscriptView for TerminalView<W> {
    fn append_message(&self, text: &str, kind: BubbleKind) {
        let text = plain_text(text);
        self.with_state(|state| {
            let label = match kind {
                BubbleKind::User => "You".bold().cyan(),
                BubbleKind::Assistant => "Advisor".bold().magenta(),
                BubbleKind::Notice => "Notice".bold().red(),
            };
            queue!(state.out, Print(label), Print(": "), Print(text), Print("\n\n"))
        });
    }

    fn show_typing_indicator(&self) -> IndicatorId {
        let id = IndicatorId::new();
        self.with_state(|state| {
            state.active_indicators.insert(id.clone());
            queue!(state.out, Print("Advisor is typing...".italic().dim()))
        });
        id
    }

    fn remove_typing_indicator(&self, id: &IndicatorId) {
        self.with_state(|state| {
            if state.active_indicators.remove(id) {
                queue!(state.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            }
            Ok(())
        });
    }

    fn set_latest_question(&self, text: Option<&str>) {
        let Some(text) = text.map(plain_text) else {
            return;
        };
        let line = format!("Latest question: {}", text);
        self.with_state(|state| queue!(state.out, Print(line.as_str().dim()), Print("\n")));
    }
}
