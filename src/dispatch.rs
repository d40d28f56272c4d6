//! Command table and line classification
//!
//! Named clients' lines are either chat text or a command. Commands are
//! looked up in [`COMMANDS`], a static table mapping each command name and
//! its single-letter alias to one handler with a uniform signature.

use tracing::debug;

use crate::error::CommandError;
use crate::server::ChatServer;
use crate::types::ClientId;

/// First character of every command
pub const COMMAND_PREFIX: char = '/';

/// Outcome of a command handler
pub type CommandResult = Result<(), CommandError>;

/// Uniform handler signature: server state, issuing client, arguments
pub type Handler = fn(&mut ChatServer, ClientId, &[&str]) -> CommandResult;

/// One entry of the command table
pub struct CommandSpec {
    /// Full name first, then aliases
    pub names: &'static [&'static str],
    pub usage: &'static str,
    pub summary: &'static str,
    pub handler: Handler,
}

impl CommandSpec {
    pub fn name(&self) -> &'static str {
        self.names[0]
    }
}

/// Every command the server understands
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        names: &["rooms", "r"],
        usage: "/rooms",
        summary: "See active rooms",
        handler: ChatServer::show_rooms,
    },
    CommandSpec {
        names: &["join", "j"],
        usage: "/join <room>",
        summary: "Join a room",
        handler: ChatServer::join,
    },
    CommandSpec {
        names: &["who", "w"],
        usage: "/who <room>",
        summary: "See who is in a room (default: current room)",
        handler: ChatServer::who,
    },
    CommandSpec {
        names: &["leave", "l"],
        usage: "/leave",
        summary: "Leave your current room",
        handler: ChatServer::leave,
    },
    CommandSpec {
        names: &["private", "p"],
        usage: "/private <user> <message>",
        summary: "Send a private message",
        handler: ChatServer::private,
    },
    CommandSpec {
        names: &["create", "c"],
        usage: "/create <name>",
        summary: "Create a new room",
        handler: ChatServer::create,
    },
    CommandSpec {
        names: &["kick", "k"],
        usage: "/kick <user1> <user2> ...",
        summary: "Kick user(s) from your current room",
        handler: ChatServer::kick,
    },
    CommandSpec {
        names: &["delete", "d"],
        usage: "/delete <name>",
        summary: "Delete a room you own",
        handler: ChatServer::delete,
    },
    CommandSpec {
        names: &["admin", "a"],
        usage: "/admin <user>",
        summary: "Let a member of your room kick others",
        handler: ChatServer::grant_admin,
    },
    CommandSpec {
        names: &["quit", "q", "exit", "x"],
        usage: "/quit",
        summary: "Disconnect from the server",
        handler: ChatServer::exit,
    },
];

/// A completed line from a named client
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    /// Line starting with the command prefix
    Command(&'a str),
    /// Text for the current room
    Chat(&'a str),
}

/// Classify a line as a command or chat
///
/// A doubled prefix escapes it: `//text` is the chat text `/text`.
pub fn classify(line: &str) -> Input<'_> {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(COMMAND_PREFIX), Some(COMMAND_PREFIX)) => {
            Input::Chat(&line[COMMAND_PREFIX.len_utf8()..])
        }
        (Some(COMMAND_PREFIX), _) => Input::Command(line),
        _ => Input::Chat(line),
    }
}

/// Find a command by name or alias (without the prefix)
pub fn lookup(token: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|command| command.names.contains(&token))
}

/// Listing of every command, sent for unknown commands
pub fn help_text() -> String {
    let mut help = String::from("Valid commands:");
    for command in COMMANDS {
        help.push_str(&format!("\n * {} - {}", command.usage, command.summary));
    }
    help.push_str("\n * To start a message with / without a command: //");
    help.push_str("\n * The first letter of a command works as well");
    help.push_str("\nEnd list");
    help
}

impl ChatServer {
    /// Run a command line for a named client
    ///
    /// Unknown commands get the help listing. A failing handler's error is
    /// reported to the caller. Returns whether the command succeeded.
    pub(crate) fn dispatch(&mut self, client_id: ClientId, line: &str) -> bool {
        let mut words = line.split_whitespace();
        let token = words
            .next()
            .and_then(|word| word.strip_prefix(COMMAND_PREFIX))
            .unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let Some(command) = lookup(token) else {
            debug!("Unknown command '{}' from {}", token, client_id);
            self.notify(client_id, help_text());
            return false;
        };

        match (command.handler)(self, client_id, &args) {
            Ok(()) => true,
            Err(e) => {
                debug!("/{} from {} failed: {}", command.name(), client_id, e);
                self.notify(client_id, e.to_string());
                false
            }
        }
    }
}
