use clap::Parser;
use skincare_chat::config::{default_config_path, load_or_initialize_config};
use skincare_chat::controller::CANCELLED_NOTICE;
use skincare_chat::identity::{FixedName, IdentityProvider, StdinPrompt};
use skincare_chat::logging::init_logging;
use skincare_chat::store::{FileStore, MemoryStore, Store, HISTORY_KEY, IDENTITY_KEY};
use skincare_chat::view::TerminalView;
use skincare_chat::{
    BubbleKind, ChatError, ConversationHistory, GenerationSettings, HttpCompletionClient,
    SubmissionController, TranscriptView,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "skincare-chat")]
#[command(about = "Chat with a L'Oréal beauty advisor from your terminal")]
#[command(version)]
struct Cli {
    /// Chat completion endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Your name, used instead of prompting when none is stored yet
    #[arg(long)]
    name: Option<String>,

    /// Directory for history, identity and logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Maximum number of messages kept in history
    #[arg(long)]
    max_history: Option<usize>,

    /// Alternate settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Forget stored history and name before starting
    #[arg(long)]
    reset: bool,
}

fn open_store(data_dir: &Path) -> Arc<dyn Store> {
    match FileStore::open(data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(path = %data_dir.display(), error = %e, "Data directory unavailable, history will not be saved");
            Arc::new(MemoryStore::new())
        }
    }
}

fn print_prompt() {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ").ok();
    stdout.flush().ok();
}

async fn run_loop(controller: &SubmissionController, view: &dyn TranscriptView) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read from stdin");
                break;
            }
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                controller.clear_history();
                continue;
            }
            _ => {}
        }

        tokio::select! {
            _ = controller.submit(&line) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Submission cancelled by user");
                view.append_message(CANCELLED_NOTICE, BubbleKind::Notice);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = load_or_initialize_config(&config_path);
    if let Some(endpoint) = cli.endpoint {
        config.endpoint.url = endpoint;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }
    if let Some(max) = cli.max_history {
        config.max_history_messages = max;
    }

    let data_dir = config.data_dir()?;
    let _log_guard = init_logging(&data_dir.join("logs"), &config.log_level);
    info!(config = %config_path.display(), endpoint = %config.endpoint.url, "Starting skincare-chat");

    let store = open_store(&data_dir);
    if cli.reset {
        for key in [HISTORY_KEY, IDENTITY_KEY] {
            if let Err(e) = store.remove(key) {
                warn!(key, error = %e, "Failed to reset stored value");
            }
        }
        info!("Reset stored history and identity");
    }

    let history = Arc::new(ConversationHistory::load(
        store.clone(),
        config.max_history_messages(),
    ));
    let identity_provider: Box<dyn IdentityProvider + Send + Sync> = match cli.name {
        Some(name) => Box::new(FixedName(Some(name))),
        None => Box::new(StdinPrompt),
    };
    let client = Arc::new(HttpCompletionClient::new(&config.endpoint)?);
    let view: Arc<dyn TranscriptView> = Arc::new(TerminalView::stdout());

    let controller = SubmissionController::new(
        store,
        history,
        identity_provider,
        client,
        view.clone(),
        GenerationSettings::from(&config.endpoint),
    );
    controller.init();
    run_loop(&controller, view.as_ref()).await;

    info!("Exiting");
    Ok(())
}
