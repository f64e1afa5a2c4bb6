//! Operator console: one command per line, case-insensitive.
//!
//! ```text
//! list     dump the live catalog
//! reload   reload notifications from the source now
//! restart  restart every service
//! exit     stop reading commands
//! help     list the commands
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::server::NotificationServer;

/// Reply to anything that is not a command.
pub const INVALID_COMMAND: &str = "Invalid command. Type 'help' for a list of commands.";

/// Console command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the catalog.
    List,
    /// Reload the catalog.
    Reload,
    /// Restart the server.
    Restart,
    /// Leave the console.
    Exit,
    /// Print the command list.
    Help,
}

impl Command {
    /// Every command in help order.
    pub const ALL: [Command; 5] = [
        Command::List,
        Command::Restart,
        Command::Reload,
        Command::Exit,
        Command::Help,
    ];

    /// Lowercase keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Command::List => "list",
            Command::Reload => "reload",
            Command::Restart => "restart",
            Command::Exit => "exit",
            Command::Help => "help",
        }
    }

    /// Runs the command and returns what to print.
    pub async fn execute(self, server: &NotificationServer) -> String {
        match self {
            Command::List => format!("Active Notifications: \n{}", server.catalog().describe()),
            Command::Reload => {
                let catalog = Arc::clone(server.catalog());
                match tokio::task::spawn_blocking(move || catalog.reload()).await {
                    Ok(Ok(s)) => format!("Reloaded {} notifications ({} skipped).", s.loaded, s.skipped),
                    Ok(Err(e)) => format!("Reload failed: {e}"),
                    Err(e) => format!("Reload failed: {e}"),
                }
            }
            Command::Restart => match server.restart().await {
                Ok(()) => "Server restarted.".to_string(),
                Err(e) => format!("Restart failed: {e}"),
            },
            Command::Exit => "Exiting...".to_string(),
            Command::Help => {
                let names: Vec<&str> = Command::ALL.iter().map(|c| c.keyword()).collect();
                format!("Commands: {}", names.join(", "))
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Input that is not a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidCommand(pub String);

impl fmt::Display for InvalidCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(INVALID_COMMAND)
    }
}

impl std::error::Error for InvalidCommand {}

impl FromStr for Command {
    type Err = InvalidCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().to_ascii_lowercase();
        Command::ALL
            .into_iter()
            .find(|c| c.keyword() == word)
            .ok_or(InvalidCommand(word))
    }
}

/// Why the console loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The operator typed `exit`.
    Command,
    /// Input closed.
    EndOfInput,
}

/// Reads commands from `input` and writes replies to `out` until `exit` or EOF.
///
/// Blank lines are ignored.
pub async fn run<R, W>(
    server: &NotificationServer,
    input: R,
    mut out: W,
) -> std::io::Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    out.write_all(b"\nType 'help' for a list of commands\n>").await?;
    out.flush().await?;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            out.write_all(b">").await?;
            out.flush().await?;
            continue;
        }
        let reply = match line.parse::<Command>() {
            Ok(cmd) => {
                tracing::debug!(command = %cmd, "console command");
                let text = cmd.execute(server).await;
                if cmd == Command::Exit {
                    out.write_all(format!("{text}\n").as_bytes()).await?;
                    out.flush().await?;
                    return Ok(ConsoleExit::Command);
                }
                text
            }
            Err(e) => e.to_string(),
        };
        out.write_all(format!("{reply}\n>").as_bytes()).await?;
        out.flush().await?;
    }
    Ok(ConsoleExit::EndOfInput)
}
