//! User identity: a display name obtained once and persisted.
use crate::store::{Store, IDENTITY_KEY};
use std::fmt;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

pub const DEFAULT_NAME: &str = "Friend";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    name: String,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Obtains a name from the user. Implementations may block.
pub trait IdentityProvider {
    /// `None` means the user declined.
    fn request_name(&self) -> Option<String>;
}

/// Asks on the terminal and waits for a line.
pub struct StdinPrompt;

impl IdentityProvider for StdinPrompt {
    fn request_name(&self) -> Option<String> {
        let mut stdout = io::stdout();
        write!(stdout, "Hi! What's your name? ").ok()?;
        stdout.flush().ok()?;

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(e) => {
                warn!(error = %e, "Failed to read name from stdin");
                None
            }
        }
    }
}

/// Supplies a preset answer, e.g. from `--name`.
pub struct FixedName(pub Option<String>);

impl IdentityProvider for FixedName {
    fn request_name(&self) -> Option<String> {
        self.0.clone()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the stored identity, or prompts for one, falling back to
/// [`DEFAULT_NAME`], and persists it immediately.
pub fn resolve_identity(store: &dyn Store, provider: &dyn IdentityProvider) -> Identity {
    if let Some(name) = non_blank(store.get(IDENTITY_KEY)) {
        return Identity::new(name);
    }

    let name = non_blank(provider.request_name()).unwrap_or_else(|| DEFAULT_NAME.to_string());
    if let Err(e) = store.set(IDENTITY_KEY, &name) {
        warn!(error = %e, "Failed to save user name, it will be asked again next time");
    }
    info!(name = %name, "Stored new user identity");
    Identity::new(name)
}
