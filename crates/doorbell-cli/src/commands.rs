//! Command parsing for the playground.
//!
//! This module parses command strings into structured [`Command`] values.

use doorbell_core::topic::{is_valid_token, token_from_ring_path};

/// Which playground peer a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The doorbell owner
    Door,
    /// The ringer
    Visitor,
}

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Owner joins the doorbell topic.
    Open,

    /// Ringer joins, optionally via a shared token or `/ring/<token>` link.
    Visit {
        /// Token to visit, `None` for the playground's own doorbell
        token: Option<String>,
    },

    /// Ringer rings the doorbell.
    Ring,

    /// Owner renames the doorbell.
    Rename {
        /// New display name.
        name: String,
    },

    /// One side leaves.
    Leave {
        /// Side that leaves.
        side: Side,
    },

    /// Print both sides' status.
    Status,

    /// Print the command list.
    Help,

    /// Quit the application.
    Quit,

    /// Nothing to do.
    Empty,

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Help text for [`Command::Help`].
pub const HELP: &str = "\
/open                 owner joins the doorbell
/visit [token|link]   ringer joins (defaults to the playground doorbell)
/ring                 ringer rings
/name <text>          owner renames the doorbell
/leave door|visitor   one side leaves
/status               show both sides
/quit                 exit";

/// Parse a user input string into a command.
///
/// Commands start with `/`.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    if input.is_empty() {
        return Command::Empty;
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let (command, rest) = cmd_str.split_once(char::is_whitespace).unwrap_or((cmd_str, ""));
    let rest = rest.trim();

    match command {
        "open" => Command::Open,

        "visit" => match rest {
            "" => Command::Visit { token: None },
            arg => {
                let token = token_from_ring_path(arg).unwrap_or(arg);
                if is_valid_token(token) {
                    Command::Visit { token: Some(token.to_string()) }
                } else {
                    Command::InvalidArgs { command: "visit".into(), error: "Invalid token".into() }
                }
            },
        },

        "ring" => Command::Ring,

        "name" => match rest {
            "" => Command::InvalidArgs {
                command: "name".into(),
                error: "Usage: /name <text>".into(),
            },
            name => Command::Rename { name: name.to_string() },
        },

        "leave" => match rest {
            "door" => Command::Leave { side: Side::Door },
            "visitor" => Command::Leave { side: Side::Visitor },
            _ => Command::InvalidArgs {
                command: "leave".into(),
                error: "Usage: /leave door|visitor".into(),
            },
        },

        "status" => Command::Status,

        "help" | "h" => Command::Help,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}
