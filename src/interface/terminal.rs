use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

use crate::{
    bus::{Event, EventBus, NotificationLevel},
    chat::{Message, Sender, Session},
    store::ChatSessionStore,
};

const HELP: &str = "\
Type a message to ask about the repository, or use a command:
  /sessions            list conversations (* = active)
  /search <term>       filter conversations by title
  /new [repository]    start a new conversation
  /select <session>    switch to a conversation
  /delete <session>    delete a conversation
  /refresh             reload conversations from the server
  /help                show this text
  /quit                exit";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Help,
    Sessions,
    Search(String),
    New(Option<String>),
    Select(String),
    Delete(String),
    Refresh,
    Quit,
    Say(String),
    Empty,
}

impl Command {
    fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Say(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let required = |usage: &str| {
            if arg.is_empty() {
                Err(format!("Usage: {}", usage))
            } else {
                Ok(arg.to_string())
            }
        };

        match name.to_lowercase().as_str() {
            "help" => Ok(Command::Help),
            "sessions" => Ok(Command::Sessions),
            "search" => Ok(Command::Search(arg.to_string())),
            "new" => Ok(Command::New((!arg.is_empty()).then(|| arg.to_string()))),
            "select" => required("/select <session-id>").map(Command::Select),
            "delete" => required("/delete <session-id>").map(Command::Delete),
            "refresh" => Ok(Command::Refresh),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command: /{}. Use /help.", other)),
        }
    }
}

pub struct TerminalInterface {
    store: Arc<ChatSessionStore>,
    bus: Arc<EventBus>,
    repository_id: Option<String>,
}

impl TerminalInterface {
    pub fn new(store: Arc<ChatSessionStore>, bus: Arc<EventBus>, repository_id: Option<String>) -> Self {
        Self {
            store,
            bus,
            repository_id,
        }
    }

    pub async fn run(&self) -> Result<()> {
        // Notifications arrive asynchronously, print them as they come
        let mut bus_rx = self.bus.subscribe();
        let listener = tokio::spawn(async move {
            while let Ok(event) = bus_rx.recv().await {
                if let Event::Notification(n) = event {
                    let marker = match n.level {
                        NotificationLevel::Error => "!",
                        NotificationLevel::Warning => "?",
                        NotificationLevel::Info | NotificationLevel::Success => "*",
                    };
                    println!("[{}] {}: {}", marker, n.title, n.description);
                }
            }
            debug!("Notification listener stopped");
        });

        self.store.bootstrap().await;
        println!("Code Buddy. Use /help to see what I can do.");
        self.print_sessions(&self.store.sessions());
        self.print_messages(&self.store.messages());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match Command::parse(&line) {
                Ok(Command::Quit) => break,
                Ok(cmd) => self.handle(cmd).await,
                Err(usage) => println!("{}", usage),
            }
        }

        listener.abort();
        info!("Terminal session ended");
        Ok(())
    }

    async fn handle(&self, cmd: Command) {
        match cmd {
            Command::Empty | Command::Quit => {}
            Command::Help => println!("{}", HELP),
            Command::Sessions => self.print_sessions(&self.store.sessions()),
            Command::Search(term) => self.print_sessions(&self.store.search_sessions(&term)),
            Command::Refresh => {
                self.store.refresh_sessions().await;
                self.print_sessions(&self.store.sessions());
            }
            Command::New(repo) => {
                let Some(repository_id) = repo.or_else(|| self.repository_id.clone()) else {
                    println!("Repository ID is missing. Use /new <repository-id>.");
                    return;
                };
                match self.store.create_session(&repository_id).await {
                    Ok(session) => println!("Started \"{}\" ({})", session.title, session.id),
                    Err(e) => error!("Could not create session: {}", e),
                }
            }
            Command::Select(id) => {
                self.store.select_session(&id).await;
                self.print_messages(&self.store.messages());
            }
            Command::Delete(id) => {
                self.store.delete_session(&id).await;
                self.print_sessions(&self.store.sessions());
            }
            Command::Say(text) => {
                if self.store.current_session_id().is_none() {
                    println!("No conversation selected. Use /new or /select first.");
                    return;
                }
                let before = self.store.messages().len();
                self.store.send_message(&text).await;
                let messages = self.store.messages();
                // Skip the echo of our own line
                for msg in messages.iter().skip(before).filter(|m| m.sender == Sender::Bot) {
                    println!("{}", format_message(msg));
                }
            }
        }
    }

    fn print_sessions(&self, sessions: &[Session]) {
        if sessions.is_empty() {
            println!("No conversations yet. Use /new <repository-id> to start one.");
            return;
        }
        for session in sessions {
            println!("{}", format_session(session));
        }
    }

    fn print_messages(&self, messages: &[Message]) {
        if messages.is_empty() && self.store.current_session_id().is_some() {
            println!("Start a conversation about your code.");
        }
        for msg in messages {
            println!("{}", format_message(msg));
        }
    }
}

fn format_session(session: &Session) -> String {
    let marker = if session.is_active { "*" } else { " " };
    match &session.last_message {
        Some(preview) => format!(
            "{} {}  {}  [{}]  {}",
            marker, session.id, session.title, session.timestamp, preview
        ),
        None => format!("{} {}  {}  [{}]", marker, session.id, session.title, session.timestamp),
    }
}

fn format_message(msg: &Message) -> String {
    let who = match msg.sender {
        Sender::User => "you",
        Sender::Bot => "bot",
    };
    let pending = if msg.is_pending() { " (sending)" } else { "" };
    format!("[{}] {}{}: {}", msg.display_time(), who, pending, msg.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_message() {
        assert_eq!(
            Command::parse("  how does the parser work? ").unwrap(),
            Command::Say("how does the parser work?".into())
        );
        assert_eq!(Command::parse("   ").unwrap(), Command::Empty);
    }

    #[test]
    fn test_commands() {
        assert_eq!(Command::parse("/sessions").unwrap(), Command::Sessions);
        assert_eq!(Command::parse("/NEW repo-7").unwrap(), Command::New(Some("repo-7".into())));
        assert_eq!(Command::parse("/new").unwrap(), Command::New(None));
        assert_eq!(Command::parse("/select  s1 ").unwrap(), Command::Select("s1".into()));
        assert_eq!(Command::parse("/search Parser").unwrap(), Command::Search("Parser".into()));
        assert_eq!(Command::parse("/exit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_missing_argument_and_unknown_command() {
        assert!(Command::parse("/delete").unwrap_err().starts_with("Usage"));
        assert!(Command::parse("/frobnicate").unwrap_err().contains("Unknown command"));
    }

    #[test]
    fn test_format_session_marks_active() {
        let session = Session {
            id: "s1".into(),
            title: "Intro".into(),
            last_message: Some("hello".into()),
            timestamp: "Just now".into(),
            is_active: true,
        };
        let line = format_session(&session);
        assert!(line.starts_with("* s1"));
        assert!(line.ends_with("hello"));
    }
}
