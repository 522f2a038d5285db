use std::future::Future;
use std::io::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand, ValueEnum};
use client::net::{HttpRelay, TransportError};
use client::{ChatClient, ChatUpdate, FileLocaleStore, LocaleStore, LocaleStrings, SendOutcome};
use frames::Locale;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("relay transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("could not save locale: {0}")]
    LocaleSave(std::io::Error),
    #[error("stdin read failed: {0}")]
    Stdin(std::io::Error),
    #[error("no reply: the chat request failed")]
    ReplyFailed,
}

#[derive(Parser, Debug)]
#[command(name = "resume-chat", about = "Ask questions about a résumé through the chat relay")]
struct Cli {
    #[arg(long, env = "RESUME_CHAT_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Reply language; saved for later runs.
    #[arg(long, value_enum)]
    language: Option<Language>,

    #[arg(long, env = "RESUME_CHAT_LOCALE_FILE", default_value = ".resume-chat-locale")]
    locale_file: String,

    /// Send the conversation so far with each question.
    #[arg(long)]
    history: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Interactive conversation (default).
    Chat,
    /// Ask one question and print the streamed reply.
    Ask { question: Vec<String> },
    /// Check that the relay is up.
    Ping,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Language {
    En,
    Ja,
}

impl From<Language> for Locale {
    fn from(language: Language) -> Self {
        match language {
            Language::En => Locale::En,
            Language::Ja => Locale::Ja,
        }
    }
}

/// A line typed at the interactive prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Help,
    SetLocale(Locale),
    UnknownCommand(&'a str),
    Question(&'a str),
}

const HELP: &str = "/lang en|ja  switch reply language
/quit        leave
Ctrl-C       cancel the reply in progress, or leave at the prompt";

/// What the prompt produced.
#[derive(Debug, PartialEq, Eq)]
enum Turn {
    Line(String),
    /// Interrupted while waiting for input.
    Interrupted,
    Eof,
}

/// Wait for the next input line, giving up as soon as `interrupt` fires.
async fn next_turn<R>(lines: &mut Lines<R>, interrupt: impl Future) -> Result<Turn, CliError>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        biased;
        _ = interrupt => Ok(Turn::Interrupted),
        line = lines.next_line() => Ok(line.map_err(CliError::Stdin)?.map_or(Turn::Eof, Turn::Line)),
    }
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line);
    };
    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit" | "exit"), None) => Input::Quit,
        (Some("help"), None) => Input::Help,
        (Some("lang"), Some("en")) => Input::SetLocale(Locale::En),
        (Some("lang"), Some("ja")) => Input::SetLocale(Locale::Ja),
        _ => Input::UnknownCommand(line),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let relay = HttpRelay::new(&cli.base_url)?;

    let store = Arc::new(FileLocaleStore::new(&cli.locale_file));
    if let Some(language) = cli.language {
        store.save(language.into()).map_err(CliError::LocaleSave)?;
    }

    match cli.command.unwrap_or(Command::Chat) {
        Command::Ping => run_ping(&relay).await,
        Command::Ask { question } => run_ask(relay, store, cli.history, &question.join(" ")).await,
        Command::Chat => run_chat(relay, store, cli.history).await,
    }
}

async fn run_ping(relay: &HttpRelay) -> Result<(), CliError> {
    relay.ping().await?;
    println!("ok");
    Ok(())
}

async fn run_ask(relay: HttpRelay, store: Arc<FileLocaleStore>, history: bool, question: &str) -> Result<(), CliError> {
    let client = build_client(relay, store, history);
    match client.send_message(question).await {
        SendOutcome::Failed => Err(CliError::ReplyFailed),
        _ => Ok(()),
    }
}

async fn run_chat(relay: HttpRelay, store: Arc<FileLocaleStore>, history: bool) -> Result<(), CliError> {
    let client = build_client(relay, store, history);
    let strings = client.strings();
    println!("{}\n", strings.title);
    if let Some(greeting) = client.messages().first() {
        println!("{}\n", greeting.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(client.strings());
        let line = match next_turn(&mut lines, tokio::signal::ctrl_c()).await? {
            Turn::Line(line) => line,
            Turn::Interrupted => {
                println!();
                break;
            }
            Turn::Eof => break,
        };

        match parse_input(&line) {
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::SetLocale(locale) => {
                client.set_locale(locale).map_err(CliError::LocaleSave)?;
                println!("language: {}", locale.as_tag());
            }
            Input::UnknownCommand(command) => println!("unknown command: {command} (try /help)"),
            Input::Question("") => {}
            Input::Question(question) => {
                tokio::select! {
                    _ = client.send_message(question) => {}
                    _ = tokio::signal::ctrl_c() => {
                        debug!("reply cancelled");
                        println!();
                    }
                }
            }
        }
    }
    Ok(())
}

fn prompt(strings: &LocaleStrings) {
    print!("{}> ", strings.prompt_label);
    let _ = std::io::stdout().flush();
}

fn build_client(relay: HttpRelay, store: Arc<FileLocaleStore>, history: bool) -> ChatClient {
    let printer = Printer::default();
    ChatClient::new(Arc::new(relay), store)
        .with_history(history)
        .on_update(move |update| printer.render(update))
}

/// Writes reply fragments to stdout as they arrive.
#[derive(Default)]
struct Printer {
    started: AtomicBool,
}

impl Printer {
    fn render(&self, update: &ChatUpdate) {
        let mut out = std::io::stdout().lock();
        match update {
            ChatUpdate::Fragment { text, .. } => {
                self.started.store(true, Ordering::Relaxed);
                let _ = write!(out, "{text}");
            }
            ChatUpdate::Finished { .. } => {
                self.started.store(false, Ordering::Relaxed);
                let _ = writeln!(out, "\n");
            }
            ChatUpdate::Failed { content, .. } => {
                if !self.started.swap(false, Ordering::Relaxed) {
                    let _ = write!(out, "{content}");
                }
                let _ = writeln!(out, "\n");
            }
        }
        let _ = out.flush();
    }
}
