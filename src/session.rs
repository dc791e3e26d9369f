//! Session bootstrap: open the backend connection, prompting for a password
//! at most once when the server asks for one.

use crate::connection_string::override_password;
use crate::password_sanitizer::sanitize_connection_string;
use std::io;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How to reach the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub base_connection_string: String,
    pub prompt_for_password: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            base_connection_string: String::new(),
            prompt_for_password: true,
        }
    }
}

impl std::fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field(
                "base_connection_string",
                &sanitize_connection_string(&self.base_connection_string),
            )
            .field("prompt_for_password", &self.prompt_for_password)
            .finish()
    }
}

/// Classified connection failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The server wanted a password and none was supplied. Retryable once.
    #[error("{0}")]
    MissingPassword(String),
    #[error("{0}")]
    Other(String),
}

impl ConnectError {
    pub fn is_missing_password(&self) -> bool {
        matches!(self, ConnectError::MissingPassword(_))
    }
}

/// Something that can open a connection from a descriptor.
pub trait Connector {
    type Connection;

    fn connect(&mut self, descriptor: &str) -> Result<Self::Connection, ConnectError>;
}

/// Source of an interactively entered password.
pub trait PasswordPrompt {
    fn read_password(&mut self) -> io::Result<String>;
}

/// Reads the password from the controlling terminal without echo.
#[derive(Debug, Default)]
pub struct TerminalPasswordPrompt;

impl PasswordPrompt for TerminalPasswordPrompt {
    fn read_password(&mut self) -> io::Result<String> {
        rpassword::prompt_password("Password: ")
    }
}

/// Where the bootstrap stands with respect to password prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    NoPasswordPromptedYet,
    PasswordPromptedOnce,
}

/// Open a connection for `options`.
///
/// The descriptor is tried verbatim first. If that fails because no password
/// was supplied and prompting is allowed, the user is asked once and the
/// merged descriptor is tried once more. Every other failure, and any second
/// failure, is reported on stderr and yields `None`.
pub fn establish<C, P>(
    options: &ConnectionOptions,
    connector: &mut C,
    prompt: &mut P,
) -> Option<C::Connection>
where
    C: Connector,
    P: PasswordPrompt,
{
    let mut state = BootstrapState::NoPasswordPromptedYet;
    let mut descriptor = options.base_connection_string.clone();

    loop {
        debug!(
            descriptor = %sanitize_connection_string(&descriptor),
            ?state,
            "connecting"
        );

        let error = match connector.connect(&descriptor) {
            Ok(connection) => {
                info!(?state, "connection established");
                return Some(connection);
            }
            Err(error) => error,
        };

        let retry = state == BootstrapState::NoPasswordPromptedYet
            && options.prompt_for_password
            && error.is_missing_password();
        if !retry {
            eprintln!("{error}");
            return None;
        }

        warn!("server requested a password; prompting");
        let password = match prompt.read_password() {
            Ok(password) => password,
            Err(e) => {
                eprintln!("Failed to read password: {e}");
                return None;
            }
        };

        descriptor = override_password(&options.base_connection_string, &password);
        state = BootstrapState::PasswordPromptedOnce;
    }
}
