use std::str::FromStr;

use once_cell::sync::Lazy;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Reset the conversation to a fresh greeting
    Clear,
    /// Save the conversation as a text file
    Export,
    /// Start or stop voice dictation
    Voice,
    /// Show help
    Help,
    /// End the signed-in session
    Signout,
    /// Exit the application
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub keyword: &'static str,
    pub description: &'static str,
}

pub static COMMAND_ENTRIES: Lazy<Vec<CommandEntry>> = Lazy::new(|| {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
});

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Clear => "clear chat history",
            SlashCommand::Export => "export the chat to a text file",
            SlashCommand::Voice => "start or stop voice input",
            SlashCommand::Help => "show available commands",
            SlashCommand::Signout => "sign out of your account",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Only `/export` reads text after the keyword
    pub fn takes_argument(self) -> bool {
        matches!(self, SlashCommand::Export)
    }
}

/// Parse a slash command from user input. Trailing text after a command
/// that takes no argument means the input is an ordinary message.
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim().strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?.to_lowercase();
    let args: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        "reset" => Some(SlashCommand::Clear),
        "save" => Some(SlashCommand::Export),
        "mic" => Some(SlashCommand::Voice),
        "logout" | "sign-out" => Some(SlashCommand::Signout),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    let argument = if args.is_empty() {
        None
    } else if command.takes_argument() {
        Some(args.join(" "))
    } else {
        return None;
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for entry in COMMAND_ENTRIES.iter() {
        help.push_str(&format!("/{} - {}\n", entry.keyword, entry.description));
    }

    help.push_str("\nKeys: Enter send · Shift+Enter newline · Ctrl+L clear · Ctrl+E export");
    help.push_str("\n      F2 / Ctrl+R voice · PgUp/PgDn scroll · Ctrl+C quit");

    help
}
