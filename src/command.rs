//! Command records: aliases, arity contract and the action they run.
//!
//! A [`Command`] is built once from a [`CommandSpec`] and never changes
//! afterwards. Validation of alias and argument spellings happens in
//! [`CommandSpec::build`], so a `Command` that exists is always well formed.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

/// Placeholder accepted as the last argument to mean "any number of trailing words".
pub const VARIADIC_ARGUMENT: &str = "...";

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@?[a-zA-Z]+$").expect("alias pattern is a valid regex")
});

static ARGUMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[?[A-Z]+\]?$").expect("argument pattern is a valid regex")
});

/// Outcome of dispatching a line to a command or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Success,
    /// The command ran but the underlying operation failed.
    Failure,
    /// Nothing in the group recognised the input.
    Unknown,
}

impl CommandResult {
    pub fn from_success(success: bool) -> Self {
        if success {
            CommandResult::Success
        } else {
            CommandResult::Failure
        }
    }

    pub fn is_success(self) -> bool {
        self == CommandResult::Success
    }

    /// Process exit code for this result: 0 on success, 1 otherwise.
    pub fn exit_code(self) -> u8 {
        match self {
            CommandResult::Success => 0,
            CommandResult::Failure | CommandResult::Unknown => 1,
        }
    }
}

/// Errors raised while registering commands and groups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command specification: {0}")]
    InvalidCommandSpec(String),
    #[error("Invalid command group name '{0}'")]
    InvalidGroupName(String),
    #[error("Duplicate command name '{0}' within one group")]
    DuplicateCommandName(String),
    #[error("Only one anonymous command is allowed within one group")]
    DuplicateAnonymousCommand,
    #[error("Unknown command group \"{0}\"")]
    UnknownGroup(String),
}

/// Action run by a command. Receives every matched word, word 0 included.
pub type Action<'a> = Box<dyn Fn(&[&str]) -> CommandResult + 'a>;

/// Whether `name` is a valid alias (or group name). The empty string is accepted.
pub fn is_valid_name(name: &str) -> bool {
    name.is_empty() || NAME_PATTERN.is_match(name)
}

/// Whether `argument` is a valid argument placeholder or the variadic marker.
pub fn is_valid_argument(argument: &str) -> bool {
    argument == VARIADIC_ARGUMENT || ARGUMENT_PATTERN.is_match(argument)
}

/// Builder collecting everything needed to register a command.
pub struct CommandSpec<'a> {
    names: Vec<String>,
    arguments: Vec<String>,
    action: Option<Action<'a>>,
    description: String,
}

impl<'a> CommandSpec<'a> {
    /// Start a spec with the given aliases. An empty list means the anonymous command.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            arguments: Vec::new(),
            action: None,
            description: String::new(),
        }
    }

    /// Spec for a group's anonymous command.
    pub fn anonymous() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&[&str]) -> CommandResult + 'a,
    {
        self.action = Some(Box::new(action));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Validate the spec and turn it into an immutable [`Command`].
    pub fn build(self) -> Result<Command<'a>, CommandError> {
        let Some(action) = self.action else {
            return Err(CommandError::InvalidCommandSpec(
                "a command requires an action".to_string(),
            ));
        };

        let mut names = self.names;
        if names.is_empty() {
            names.push(String::new());
        }

        if let Some(bad) = names.iter().find(|name| !is_valid_name(name)) {
            return Err(CommandError::InvalidCommandSpec(format!(
                "invalid command name '{bad}'"
            )));
        }

        if let Some(bad) = self.arguments.iter().find(|arg| !is_valid_argument(arg)) {
            return Err(CommandError::InvalidCommandSpec(format!(
                "invalid argument '{bad}'"
            )));
        }

        let variadic_position = self
            .arguments
            .iter()
            .position(|arg| arg == VARIADIC_ARGUMENT);
        if let Some(position) = variadic_position {
            if position + 1 != self.arguments.len() {
                return Err(CommandError::InvalidCommandSpec(format!(
                    "'{VARIADIC_ARGUMENT}' must be the last argument"
                )));
            }
        }

        Ok(Command {
            names,
            arguments: self.arguments,
            action,
            description: self.description,
            variadic: variadic_position.is_some(),
        })
    }
}

/// A registered command. Immutable once built.
pub struct Command<'a> {
    names: Vec<String>,
    arguments: Vec<String>,
    action: Action<'a>,
    description: String,
    variadic: bool,
}

impl<'a> Command<'a> {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn is_anonymous(&self) -> bool {
        self.names.iter().any(String::is_empty)
    }

    /// Run the command on `words`, where `words[0]` is the command token itself.
    ///
    /// Non-variadic commands reject more trailing words than they declare
    /// arguments; the action is not called in that case.
    pub fn invoke(&self, words: &[&str]) -> CommandResult {
        debug_assert!(!words.is_empty(), "a command needs at least its own token");
        let Some(first) = words.first() else {
            return CommandResult::Failure;
        };

        if !self.variadic {
            let given = words.len() - 1;
            let expected = self.arguments.len();
            if given > expected {
                warn!(command = %first, expected, given, "too many arguments");
                eprintln!(
                    "Command ({first}) failed: Too many arguments. Expected {expected}, but {given} were given."
                );
                return CommandResult::Failure;
            }
        }

        (self.action)(words)
    }
}

impl fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("names", &self.names)
            .field("arguments", &self.arguments)
            .field("description", &self.description)
            .field("variadic", &self.variadic)
            .finish_non_exhaustive()
    }
}
