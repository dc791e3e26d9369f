//! Multi-group resolution: the first group that recognises a line wins.

use crate::command::{CommandError, CommandResult};
use crate::command_group::CommandGroup;
use std::io::{self, Write};
use tracing::{debug, error};

pub const USAGE: &str = "You are using pgcrust, yet another command-line interface to PostgreSQL.";

/// Registered command groups, consulted in registration order.
#[derive(Debug, Default)]
pub struct Dispatcher<'a> {
    groups: Vec<CommandGroup<'a>>,
}

impl<'a> Dispatcher<'a> {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    pub fn register_group(&mut self, group: CommandGroup<'a>) {
        debug!(group = group.name(), "registered command group");
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[CommandGroup<'a>] {
        &self.groups
    }

    /// Hand `words` to each group in turn. A group answering anything other
    /// than [`CommandResult::Unknown`] ends the search.
    pub fn resolve_and_run(&self, words: &[&str]) -> CommandResult {
        if words.is_empty() {
            return CommandResult::Unknown;
        }

        for group in &self.groups {
            let result = group.dispatch(words);
            if result != CommandResult::Unknown {
                debug!(group = group.name(), command = words[0], ?result, "dispatched");
                return result;
            }
        }

        CommandResult::Unknown
    }

    /// First alias across all groups starting with `prefix`.
    pub fn prefix_search(&self, prefix: &str) -> Option<&str> {
        self.groups.iter().find_map(|group| group.prefix_search(prefix))
    }

    /// Every alias across all groups starting with `prefix`, group order first.
    pub fn prefix_matches(&self, prefix: &str) -> Vec<String> {
        let mut matches: Vec<String> = Vec::new();
        for group in &self.groups {
            for name in group.prefix_matches(prefix) {
                if !matches.iter().any(|seen| seen == name) {
                    matches.push(name.to_string());
                }
            }
        }
        matches
    }

    /// Help meta-command.
    ///
    /// With an empty `name`, prints the usage banner and one line per group.
    /// Otherwise prints the detailed help of the group called `name`, or
    /// reports it as unknown on `err` and returns [`CommandResult::Failure`].
    pub fn help_groups(&self, name: &str, out: &mut dyn Write, err: &mut dyn Write) -> CommandResult {
        let written = if name.is_empty() {
            self.describe_groups(out)
        } else {
            match self.groups.iter().find(|group| group.name() == name) {
                Some(group) => group.help(out),
                None => {
                    let unknown = CommandError::UnknownGroup(name.to_string());
                    let _ = writeln!(err, "{unknown}");
                    return CommandResult::Failure;
                }
            }
        };

        match written {
            Ok(()) => CommandResult::Success,
            Err(e) => {
                error!("failed to write help: {e}");
                CommandResult::Failure
            }
        }
    }

    fn describe_groups(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{USAGE}")?;
        writeln!(out, "Groups:")?;
        for group in &self.groups {
            group.describe(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandSpec, VARIADIC_ARGUMENT};
    use rstest::rstest;
    use std::cell::Cell;

    fn ok(_: &[&str]) -> CommandResult {
        CommandResult::Success
    }

    #[test]
    fn test_first_group_without_match_falls_through() {
        let a_calls = Cell::new(0);
        let b_calls = Cell::new(0);

        let mut a = CommandGroup::new("a", "first").unwrap();
        a.register(CommandSpec::new(["y"]).action(|_| {
            a_calls.set(a_calls.get() + 1);
            CommandResult::Success
        }))
        .unwrap();
        let mut b = CommandGroup::new("b", "second").unwrap();
        b.register(CommandSpec::new(["x"]).action(|_| {
            b_calls.set(b_calls.get() + 1);
            CommandResult::Success
        }))
        .unwrap();

        assert_eq!(a.dispatch(&["x"]), CommandResult::Unknown);

        let mut dispatcher = Dispatcher::new();
        dispatcher.register_group(a);
        dispatcher.register_group(b);

        assert_eq!(dispatcher.resolve_and_run(&["x"]), CommandResult::Success);
        assert_eq!(a_calls.get(), 0);
        assert_eq!(b_calls.get(), 1);
    }

    #[test]
    fn test_first_registered_group_wins_on_alias_collision() {
        let winner = Cell::new("");
        let mut a = CommandGroup::new("a", "").unwrap();
        a.register(CommandSpec::new(["x"]).action(|_| {
            winner.set("a");
            CommandResult::Failure
        }))
        .unwrap();
        let mut b = CommandGroup::new("b", "").unwrap();
        b.register(CommandSpec::new(["x"]).action(|_| {
            winner.set("b");
            CommandResult::Success
        }))
        .unwrap();

        let mut dispatcher = Dispatcher::new();
        dispatcher.register_group(a);
        dispatcher.register_group(b);

        // A failure in the first group stops the search.
        assert_eq!(dispatcher.resolve_and_run(&["x"]), CommandResult::Failure);
        assert_eq!(winner.get(), "a");
    }

    #[test]
    fn test_all_unknown_reports_unknown() {
        let mut a = CommandGroup::new("a", "").unwrap();
        a.register(CommandSpec::new(["x"]).action(ok)).unwrap();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_group(a);

        assert_eq!(dispatcher.resolve_and_run(&["nope"]), CommandResult::Unknown);
        assert_eq!(dispatcher.resolve_and_run(&[]), CommandResult::Unknown);
        assert_eq!(Dispatcher::new().resolve_and_run(&["x"]), CommandResult::Unknown);
    }

    #[test]
    fn test_anonymous_group_catches_everything_after_named_groups() {
        let mut meta = CommandGroup::new("meta", "").unwrap();
        meta.register(CommandSpec::new(["@l"]).action(ok)).unwrap();
        let mut sql = CommandGroup::new("sql", "").unwrap();
        sql.register(
            CommandSpec::anonymous()
                .arguments([VARIADIC_ARGUMENT])
                .action(|words| CommandResult::from_success(words[0] == "select")),
        )
        .unwrap();

        let mut dispatcher = Dispatcher::new();
        dispatcher.register_group(meta);
        dispatcher.register_group(sql);

        assert_eq!(dispatcher.resolve_and_run(&["@l"]), CommandResult::Success);
        assert_eq!(dispatcher.resolve_and_run(&["select", "1"]), CommandResult::Success);
        assert_eq!(dispatcher.resolve_and_run(&["vacuum"]), CommandResult::Failure);
    }

    fn dispatcher_with_groups() -> Dispatcher<'static> {
        let mut a = CommandGroup::new("pgcrust", "pgcrust commands").unwrap();
        a.register(CommandSpec::new(["@l"]).action(ok).description("List databases"))
            .unwrap();
        let mut b = CommandGroup::new("extra", "extra commands").unwrap();
        b.register(CommandSpec::new(["@lo"]).action(ok).description("Large objects"))
            .unwrap();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_group(a);
        dispatcher.register_group(b);
        dispatcher
    }

    #[test]
    fn test_help_without_name_lists_groups() {
        let dispatcher = dispatcher_with_groups();
        let mut out = Vec::new();
        let mut err = Vec::new();

        assert_eq!(dispatcher.help_groups("", &mut out, &mut err), CommandResult::Success);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(USAGE));
        assert!(text.contains("  pgcrust:\tpgcrust commands\n"));
        assert!(text.contains("  extra:\textra commands\n"));
        assert!(err.is_empty());
    }

    #[test]
    fn test_help_for_named_group() {
        let dispatcher = dispatcher_with_groups();
        let mut out = Vec::new();
        let mut err = Vec::new();

        assert_eq!(dispatcher.help_groups("extra", &mut out, &mut err), CommandResult::Success);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("extra:\n"));
        assert!(text.contains("@lo"));
        assert!(!text.contains("@l\t"));
    }

    #[rstest]
    #[case("missing")]
    #[case("PGCRUST")]
    fn test_help_for_unknown_group_fails(#[case] name: &str) {
        let dispatcher = dispatcher_with_groups();
        let mut out = Vec::new();
        let mut err = Vec::new();

        assert_eq!(dispatcher.help_groups(name, &mut out, &mut err), CommandResult::Failure);
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).unwrap(),
            format!("Unknown command group \"{name}\"\n")
        );
        // Groups are untouched.
        assert_eq!(dispatcher.groups().len(), 2);
        assert_eq!(dispatcher.resolve_and_run(&["@l"]), CommandResult::Success);
        assert_eq!(dispatcher.groups()[0].commands().len(), 1);
    }

    #[test]
    fn test_prefix_search_across_groups() {
        let dispatcher = dispatcher_with_groups();
        assert_eq!(dispatcher.prefix_search("@l"), Some("@l"));
        assert_eq!(dispatcher.prefix_search("@lo"), Some("@lo"));
        assert_eq!(dispatcher.prefix_search("@z"), None);
        assert_eq!(dispatcher.prefix_matches("@l"), vec!["@l".to_string(), "@lo".to_string()]);
    }
}
