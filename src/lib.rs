//! pgcrust: an interactive PostgreSQL shell built around a validated
//! command registry.
//!
//! Commands are declared with [`CommandSpec`], grouped in a
//! [`CommandGroup`] and routed by a [`Dispatcher`]. The session layer
//! connects with a one-shot password prompt fallback.

pub mod cli_core;
pub mod command;
pub mod command_group;
pub mod completion;
pub mod config;
pub mod connection_string;
pub mod db;
pub mod dispatcher;
pub mod format;
pub mod logging;
pub mod meta_commands;
pub mod password_sanitizer;
pub mod prompt;
pub mod session;

pub use command::{Command, CommandError, CommandResult, CommandSpec};
pub use command_group::CommandGroup;
pub use config::Config;
pub use db::DbProxy;
pub use dispatcher::Dispatcher;
pub use session::{ConnectionOptions, establish};
