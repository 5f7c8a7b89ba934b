//! Command catalog: the fixed set of commands and the aliases that name them.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Action
// ============================================================================

/// What a command does once it has been recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Compile asm2bf source to brainfuck.
    Build,
    /// Interpret a brainfuck program.
    Run,
    /// Compile asm2bf source, then interpret the result.
    BuildAndRun,
    /// Show the tutorial.
    Help,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Build => "BUILD",
            Action::Run => "RUN",
            Action::BuildAndRun => "BUILD_AND_RUN",
            Action::Help => "HELP",
        }
    }

    /// Whether the action needs a code block in the message.
    pub fn requires_payload(&self) -> bool {
        !matches!(self, Action::Help)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Command
// ============================================================================

/// A recognisable command with one or more textual aliases.
///
/// Alias order matters: the first alias is the display name used in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    id: String,
    aliases: Vec<String>,
    action: Action,
}

impl Command {
    pub fn new<I, S>(id: impl Into<String>, aliases: I, action: Action) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            aliases: aliases.into_iter().map(Into::into).collect(),
            action,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// First alias, or the id for a command that somehow has none.
    pub fn display_name(&self) -> &str {
        self.aliases.first().map(String::as_str).unwrap_or(&self.id)
    }

    pub fn requires_payload(&self) -> bool {
        self.action.requires_payload()
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Errors raised while assembling a catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog has no commands")]
    Empty,
    #[error("command '{0}' has no aliases")]
    NoAliases(String),
    #[error("command '{0}' has an empty alias")]
    EmptyAlias(String),
    #[error("alias '{alias}' is used by both '{first}' and '{second}'")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },
}

/// Ordered, validated list of commands.
///
/// Order is significant: ties during resolution go to the earliest command.
#[derive(Debug, Clone)]
pub struct Catalog {
    commands: Vec<Command>,
}

impl Catalog {
    /// Build a catalog, rejecting empty or duplicate aliases.
    pub fn new(commands: Vec<Command>) -> Result<Self, CatalogError> {
        if commands.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for command in &commands {
            if command.aliases.is_empty() {
                return Err(CatalogError::NoAliases(command.id.clone()));
            }
            for alias in &command.aliases {
                if alias.trim().is_empty() {
                    return Err(CatalogError::EmptyAlias(command.id.clone()));
                }
                if let Some(first) = owners.insert(alias.as_str(), command.id.as_str()) {
                    return Err(CatalogError::DuplicateAlias {
                        alias: alias.clone(),
                        first: first.to_string(),
                        second: command.id.clone(),
                    });
                }
            }
        }

        Ok(Self { commands })
    }

    /// The asm2bf/brainfuck command table.
    pub fn standard() -> Self {
        Self {
            commands: vec![
                Command::new(
                    "build",
                    [
                        "build brainfuck",
                        "build bf",
                        "bf",
                        "compile asm2bf",
                        "compile bfasm",
                    ],
                    Action::Build,
                ),
                Command::new(
                    "run",
                    ["run brainfuck", "run bf", "execute bf", "execute brainfuck"],
                    Action::Run,
                ),
                Command::new(
                    "build-and-run",
                    ["run asm2bf", "run bfasm", "execute asm2bf", "execute bfasm"],
                    Action::BuildAndRun,
                ),
                Command::new("help", ["help", "tutorial"], Action::Help),
            ],
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn get(&self, id: &str) -> Option<&Command> {
        self.commands.iter().find(|command| command.id == id)
    }
}
