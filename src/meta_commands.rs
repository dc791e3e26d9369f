//! Built-in `pgcrust` command group: psql-style meta-commands plus the
//! anonymous SQL passthrough.

use crate::command::{CommandError, CommandResult, CommandSpec, VARIADIC_ARGUMENT};
use crate::command_group::CommandGroup;
use crate::db::DbProxy;

/// Everything the built-in commands need from the backend.
pub trait MetaBackend {
    fn execute(&self, sql: &str) -> bool;
    fn list_dbs(&self) -> bool;
    fn list_roles(&self) -> bool;
    fn list_schemas(&self) -> bool;
    fn print_connection_info(&self) -> bool;
}

impl MetaBackend for DbProxy {
    fn execute(&self, sql: &str) -> bool {
        self.do_transaction(sql, "")
    }

    fn list_dbs(&self) -> bool {
        DbProxy::list_dbs(self)
    }

    fn list_roles(&self) -> bool {
        DbProxy::list_roles(self)
    }

    fn list_schemas(&self) -> bool {
        DbProxy::list_schemas(self)
    }

    fn print_connection_info(&self) -> bool {
        DbProxy::print_connection_info(self)
    }
}

/// Re-join tokenised words into one statement.
pub fn join_words(words: &[&str]) -> String {
    words.join(" ")
}

pub fn create_psql_command_group<B: MetaBackend>(
    backend: &B,
) -> Result<CommandGroup<'_>, CommandError> {
    let mut group = CommandGroup::new("pgcrust", "pgcrust commands")?;

    group
        .register(
            CommandSpec::anonymous()
                .arguments([VARIADIC_ARGUMENT])
                .action(move |words| CommandResult::from_success(backend.execute(&join_words(words))))
                .description("To execute query"),
        )?
        .register(
            CommandSpec::new(["@l"])
                .action(move |_| CommandResult::from_success(backend.list_dbs()))
                .description("List databases"),
        )?
        .register(
            CommandSpec::new(["@du"])
                .action(move |_| CommandResult::from_success(backend.list_roles()))
                .description("List roles"),
        )?
        .register(
            CommandSpec::new(["@dn"])
                .action(move |_| CommandResult::from_success(backend.list_schemas()))
                .description("List schemas"),
        )?
        .register(
            CommandSpec::new(["@conninfo"])
                .action(move |_| CommandResult::from_success(backend.print_connection_info()))
                .description("Display information about current connection"),
        )?;

    Ok(group)
}
