//! Terminal chat client
//!
//! Reads lines from stdin and streams the agent's replies to stdout. Lines
//! starting with `/` are commands; see `/help`.

use chat_widget::{
    ApiClient, Callbacks, ConversationManager, LoggingTransport, Message, Role, SendOutcome,
    WidgetConfig,
};
use futures::StreamExt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::WatchStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Manager = ConversationManager<Arc<LoggingTransport<ApiClient>>>;

const HELP: &str = "\
/agents          list available agents
/sessions        list sessions
/session <id>    switch to another session
/clear           dismiss the current error
/quit            exit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = WidgetConfig::from_env()?;
    let client = ApiClient::new(config.client_config())?;
    let transport = Arc::new(LoggingTransport::new(client));

    let callbacks = Callbacks::new()
        .on_session_created(|id| tracing::info!(session_id = %id, "Session created"))
        .on_error(|e| eprintln!("error: {e}"));
    let manager = Arc::new(ConversationManager::new(
        Arc::clone(&transport),
        &config,
        callbacks,
    ));

    tracing::info!(
        agent_id = %config.agent_id,
        base_url = %config.api_base_url,
        session_id = ?config.session_id,
        "Chat client starting"
    );

    let printer = Arc::new(Mutex::new(ReplyPrinter::default()));
    tokio::spawn(watch_replies(Arc::clone(&manager), Arc::clone(&printer)));

    // Mount: show any existing history before the initial message goes out
    manager.reconcile_history().await;
    print_history(&manager.messages());
    finish_reply(&printer, &manager.send_initial_if_due().await);

    if !config.quick_questions.is_empty() {
        println!("Suggested questions:");
        for question in &config.quick_questions {
            println!("  - {question}");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            if !run_command(command, &manager, transport.inner()).await {
                break;
            }
            continue;
        }
        finish_reply(&printer, &manager.send_message(line, None).await);
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chat_widget=info".into());
    let json = std::env::var("CHAT_WIDGET_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Returns false when the client should exit
async fn run_command(command: &str, manager: &Manager, client: &ApiClient) -> bool {
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));

    match name {
        "quit" | "exit" => return false,
        "clear" => manager.clear_error(),
        "agents" => match client.list_agents().await {
            Ok(agents) if agents.is_empty() => println!("No agents"),
            Ok(agents) => {
                for agent in agents {
                    println!("{}  {}  {}", agent.id, agent.name, agent.description);
                }
            }
            Err(e) => eprintln!("error: {e}"),
        },
        "sessions" => match client.list_sessions().await {
            Ok(sessions) => {
                for session in sessions {
                    println!(
                        "{}  {}",
                        session.id,
                        session.name.as_deref().unwrap_or("(unnamed)")
                    );
                }
            }
            Err(e) => eprintln!("error: {e}"),
        },
        "session" if arg.is_empty() => match manager.session_id() {
            Some(id) => println!("Session: {id}"),
            None => println!("No session yet"),
        },
        "session" => {
            manager.set_external_session_id(Some(arg.to_string())).await;
            print_history(&manager.messages());
        }
        _ => println!("{HELP}"),
    }
    true
}

fn print_history(messages: &[Message]) {
    for message in messages {
        println!("{}> {}", message.role.as_str(), message.content);
    }
}

fn finish_reply(printer: &Mutex<ReplyPrinter>, outcome: &SendOutcome) {
    let mut printer = printer.lock().unwrap_or_else(PoisonError::into_inner);
    if let SendOutcome::Completed(reply) = outcome {
        printer.show(reply);
    }
    printer.end();
}

/// Print streamed tokens as they arrive
async fn watch_replies(manager: Arc<Manager>, printer: Arc<Mutex<ReplyPrinter>>) {
    let mut snapshots = WatchStream::new(manager.subscribe());
    while let Some(state) = snapshots.next().await {
        if !state.is_loading {
            continue;
        }
        if let Some(last) = state.last_message().filter(|m| m.role == Role::Assistant) {
            printer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .show(last);
        }
    }
}

/// Tracks how much of the current reply is already on screen
#[derive(Default)]
struct ReplyPrinter {
    current: Option<String>,
    printed: usize,
    closed: bool,
}

impl ReplyPrinter {
    fn show(&mut self, reply: &Message) {
        let same = self.current.as_deref() == Some(reply.id.as_str());
        if same && self.closed {
            return;
        }
        let mut out = std::io::stdout().lock();
        if !same {
            self.current = Some(reply.id.clone());
            self.printed = 0;
            self.closed = false;
            let _ = write!(out, "assistant> ");
        }
        if let Some(delta) = reply.content.get(self.printed..) {
            let _ = write!(out, "{delta}");
            self.printed = reply.content.len();
        }
        let _ = out.flush();
    }

    fn end(&mut self) {
        if self.current.is_some() && !self.closed {
            println!();
            self.closed = true;
        }
    }
}
