//! Console channel: reads lines from stdin, runs them through the
//! [`ChatService`], prints the reply to stdout.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C), stdin is closed,
//! or the user types `/quit`. Slash commands:
//!
//! | command          | effect                                  |
//! |------------------|-----------------------------------------|
//! | `/new [title]`   | start a fresh conversation              |
//! | `/text`          | print the current editor text           |
//! | `/tools`         | list the available tools                |
//! | `/help`          | list commands                           |
//! | `/quit`          | leave the console                       |

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::{ChatReply, ChatService};
use crate::error::AppError;
use crate::tools::ToolId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New(Option<String>),
    Text,
    Tools,
    Help,
    Quit,
    Unknown(String),
    Message(String),
}

/// Interpret one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Message(line.to_string()));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((n, a)) => (n, Some(a.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    Some(match name {
        "new" => Command::New(arg.map(str::to_string)),
        "text" => Command::Text,
        "tools" => Command::Tools,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    })
}

const HELP: &str = "\
/new [title]  start a fresh conversation
/text         print the current editor text
/tools        list the available tools
/help         show this help
/quit         leave";

/// Drive the console on the process's stdin/stdout.
pub async fn run(service: ChatService, shutdown: CancellationToken) -> Result<(), AppError> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = std::io::stdout();
    run_with(service, stdin, stdout, shutdown).await
}

/// Console loop over arbitrary line input and output.
pub async fn run_with<R, W>(
    service: ChatService,
    input: R,
    mut out: W,
    shutdown: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut conversation = service.create_conversation(None).await?;
    info!(conversation_id = %conversation.id, "console started");
    writeln!(out, "─────────────────────────────────")?;
    writeln!(out, " Scrivener console  (/help, Ctrl-C to quit)")?;
    writeln!(out, "─────────────────────────────────")?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let line = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("console stdin closed");
                break;
            }
            Err(e) => {
                warn!("console read error: {e}");
                break;
            }
        };

        let Some(command) = parse_line(&line) else { continue };
        debug!(command = ?command, "console input");

        match command {
            Command::Quit => break,
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Tools => {
                for tool in ToolId::ALL {
                    writeln!(out, "{:<20} {}", tool.as_str(), tool.description())?;
                }
            }
            Command::Unknown(name) => writeln!(out, "unknown command: /{name} (try /help)")?,
            Command::New(title) => {
                conversation = service.create_conversation(title.as_deref()).await?;
                writeln!(out, "[new conversation: {}]", conversation.title)?;
            }
            Command::Text => match service.artifact(&conversation.id).await? {
                Some(text) => writeln!(out, "{text}")?,
                None => writeln!(out, "[editor is empty]")?,
            },
            Command::Message(message) => {
                let reply = service.send(&conversation.id, &message).await?;
                print_reply(&mut out, &reply)?;
            }
        }
    }

    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn print_reply<W: Write>(out: &mut W, reply: &ChatReply) -> std::io::Result<()> {
    writeln!(out, "{}", reply.message)?;
    let tools: Vec<&str> = reply.tools_used.iter().map(ToolId::as_str).collect();
    if !tools.is_empty() {
        writeln!(out, "  tools: {}", tools.join(", "))?;
    }
    if let Some(text) = &reply.artifact {
        writeln!(out, "  editor: {} words (/text to show)", crate::tools::extract::word_count(text))?;
    }
    Ok(())
}
