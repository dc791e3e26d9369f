//! Named collections of commands with per-group alias uniqueness.

use crate::command::{Command, CommandError, CommandResult, CommandSpec, is_valid_name};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::ops::Bound;
use tracing::debug;

/// An ordered set of commands sharing one namespace.
///
/// Commands live in an arena (`commands`). The alias map and the anonymous
/// slot only hold indices into it.
pub struct CommandGroup<'a> {
    name: String,
    description: String,
    commands: Vec<Command<'a>>,
    by_name: BTreeMap<String, usize>,
    anonymous: Option<usize>,
}

impl<'a> CommandGroup<'a> {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, CommandError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(CommandError::InvalidGroupName(name));
        }

        Ok(Self {
            name,
            description: description.into(),
            commands: Vec::new(),
            by_name: BTreeMap::new(),
            anonymous: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Commands in registration order.
    pub fn commands(&self) -> &[Command<'a>] {
        &self.commands
    }

    pub fn has_anonymous_command(&self) -> bool {
        self.anonymous.is_some()
    }

    /// Validate and add a command. On error the group is left untouched.
    pub fn register(&mut self, spec: CommandSpec<'a>) -> Result<&mut Self, CommandError> {
        let command = spec.build()?;

        let mut wants_anonymous = false;
        for (position, name) in command.names().iter().enumerate() {
            if name.is_empty() {
                if self.anonymous.is_some() || wants_anonymous {
                    return Err(CommandError::DuplicateAnonymousCommand);
                }
                wants_anonymous = true;
            } else if self.by_name.contains_key(name)
                || command.names()[..position].contains(name)
            {
                return Err(CommandError::DuplicateCommandName(name.clone()));
            }
        }

        let index = self.commands.len();
        for name in command.names() {
            if name.is_empty() {
                self.anonymous = Some(index);
            } else {
                self.by_name.insert(name.clone(), index);
            }
        }

        debug!(group = %self.name, names = ?command.names(), "registered command");
        self.commands.push(command);
        Ok(self)
    }

    /// Route `words` to the command named by `words[0]`, falling back to the
    /// anonymous command, which receives the same unstripped words.
    pub fn dispatch(&self, words: &[&str]) -> CommandResult {
        let Some(first) = words.first() else {
            return CommandResult::Unknown;
        };

        if let Some(&index) = self.by_name.get(*first) {
            return self.commands[index].invoke(words);
        }

        match self.anonymous {
            Some(index) => self.commands[index].invoke(words),
            None => CommandResult::Unknown,
        }
    }

    /// First alias starting with `prefix`. Aliases are kept in lexical
    /// order, so this is the smallest matching alias.
    pub fn prefix_search(&self, prefix: &str) -> Option<&str> {
        self.by_name
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .next()
            .map(|(name, _)| name.as_str())
            .filter(|name| name.starts_with(prefix))
    }

    /// Every alias starting with `prefix`, in lexical order.
    pub fn prefix_matches<'s, 'p>(&'s self, prefix: &'p str) -> impl Iterator<Item = &'s str> {
        self.by_name
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(name, _)| name.as_str())
            .take_while(move |name| name.starts_with(prefix))
    }

    /// Detailed help: one line per alias.
    pub fn help(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}:", self.name)?;
        for (name, &index) in &self.by_name {
            let command = &self.commands[index];
            let mut usage = name.clone();
            for argument in command.arguments() {
                usage.push(' ');
                usage.push_str(argument);
            }
            let padding = if usage.len() < 6 { "\t\t" } else { "\t" };
            writeln!(out, "  {usage}{padding}{}", command.description())?;
        }
        if let Some(index) = self.anonymous {
            writeln!(out, "  <input>\t{}", self.commands[index].description())?;
        }
        writeln!(out)
    }

    /// One-line summary of the group.
    pub fn describe(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "  {}:\t{}", self.name, self.description)
    }
}

impl std::fmt::Debug for CommandGroup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGroup")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("commands", &self.commands)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::VARIADIC_ARGUMENT;
    use rstest::{fixture, rstest};
    use std::cell::RefCell;

    fn ok(_: &[&str]) -> CommandResult {
        CommandResult::Success
    }

    #[fixture]
    fn group() -> CommandGroup<'static> {
        let mut group = CommandGroup::new("pgcrust", "pgcrust commands").unwrap();
        group
            .register(CommandSpec::new(["@l"]).action(ok).description("List databases"))
            .unwrap()
            .register(CommandSpec::new(["@du"]).action(ok).description("List roles"))
            .unwrap()
            .register(CommandSpec::new(["@dn"]).action(ok).description("List schemas"))
            .unwrap();
        group
    }

    #[rstest]
    #[case("")]
    #[case("pgcrust")]
    #[case("@meta")]
    fn test_valid_group_names(#[case] name: &str) {
        assert!(CommandGroup::new(name, "").is_ok());
    }

    #[rstest]
    #[case("pg crust")]
    #[case("pg_crust")]
    #[case("@")]
    fn test_invalid_group_names(#[case] name: &str) {
        let err = CommandGroup::new(name, "").unwrap_err();
        assert_eq!(err, CommandError::InvalidGroupName(name.to_string()));
    }

    #[rstest]
    fn test_duplicate_name_in_same_group_fails(mut group: CommandGroup<'static>) {
        let err = group
            .register(CommandSpec::new(["@x", "@l"]).action(ok))
            .unwrap_err();
        assert_eq!(err, CommandError::DuplicateCommandName("@l".to_string()));
        // The failed registration must not have claimed "@x".
        assert_eq!(group.commands().len(), 3);
        assert_eq!(group.prefix_search("@x"), None);
    }

    #[test]
    fn test_duplicate_alias_within_one_command_fails() {
        let mut group = CommandGroup::new("g", "").unwrap();
        let err = group
            .register(CommandSpec::new(["a", "a"]).action(ok))
            .unwrap_err();
        assert_eq!(err, CommandError::DuplicateCommandName("a".to_string()));
        assert!(group.commands().is_empty());
    }

    #[test]
    fn test_same_name_in_different_groups_succeeds() {
        let mut first = CommandGroup::new("first", "").unwrap();
        let mut second = CommandGroup::new("second", "").unwrap();
        assert!(first.register(CommandSpec::new(["x"]).action(ok)).is_ok());
        assert!(second.register(CommandSpec::new(["x"]).action(ok)).is_ok());
    }

    #[rstest]
    fn test_second_anonymous_command_fails(mut group: CommandGroup<'static>) {
        assert!(group.register(CommandSpec::anonymous().action(ok)).is_ok());
        assert!(group.has_anonymous_command());

        let err = group
            .register(CommandSpec::new([""]).action(ok))
            .unwrap_err();
        assert_eq!(err, CommandError::DuplicateAnonymousCommand);
        assert_eq!(group.commands().len(), 4);
    }

    #[test]
    fn test_invalid_spec_propagates() {
        let mut group = CommandGroup::new("g", "").unwrap();
        let err = group.register(CommandSpec::new(["ok"])).unwrap_err();
        assert!(matches!(err, CommandError::InvalidCommandSpec(_)));
    }

    #[test]
    fn test_dispatch_named_and_anonymous() {
        let calls = RefCell::new(Vec::new());
        let mut group = CommandGroup::new("g", "").unwrap();
        group
            .register(CommandSpec::new(["@l"]).action(|words| {
                calls.borrow_mut().push(format!("named:{}", words.join(" ")));
                CommandResult::Success
            }))
            .unwrap()
            .register(
                CommandSpec::anonymous()
                    .arguments([VARIADIC_ARGUMENT])
                    .action(|words| {
                        calls.borrow_mut().push(format!("anonymous:{}", words.join(" ")));
                        CommandResult::Failure
                    }),
            )
            .unwrap();

        assert_eq!(group.dispatch(&["@l"]), CommandResult::Success);
        assert_eq!(group.dispatch(&["select", "1"]), CommandResult::Failure);
        drop(group);

        assert_eq!(
            calls.into_inner(),
            vec!["named:@l".to_string(), "anonymous:select 1".to_string()]
        );
    }

    #[rstest]
    fn test_dispatch_is_case_sensitive(group: CommandGroup<'static>) {
        assert_eq!(group.dispatch(&["@L"]), CommandResult::Unknown);
        assert_eq!(group.dispatch(&["@l"]), CommandResult::Success);
    }

    #[rstest]
    fn test_dispatch_without_match_is_unknown(group: CommandGroup<'static>) {
        assert_eq!(group.dispatch(&["select", "1"]), CommandResult::Unknown);
        assert_eq!(group.dispatch(&[]), CommandResult::Unknown);
    }

    #[rstest]
    fn test_named_command_arity_checked(group: CommandGroup<'static>) {
        assert_eq!(group.dispatch(&["@l", "extra"]), CommandResult::Failure);
    }

    #[rstest]
    #[case("@d", Some("@dn"))]
    #[case("@du", Some("@du"))]
    #[case("@", Some("@dn"))]
    #[case("@l", Some("@l"))]
    #[case("x", None)]
    #[case("", Some("@dn"))]
    #[case("@zz", None)]
    fn test_prefix_search(group: CommandGroup<'static>, #[case] prefix: &str, #[case] expected: Option<&str>) {
        assert_eq!(group.prefix_search(prefix), expected);
    }

    #[rstest]
    fn test_prefix_matches_are_sorted(group: CommandGroup<'static>) {
        let matches: Vec<&str> = group.prefix_matches("@d").collect();
        assert_eq!(matches, vec!["@dn", "@du"]);
    }

    #[rstest]
    fn test_prefix_matches_edges(group: CommandGroup<'static>) {
        assert_eq!(group.prefix_matches("").count(), group.commands().len());
        assert_eq!(group.prefix_matches("@zz").count(), 0);
        assert_eq!(group.prefix_matches("@l").collect::<Vec<_>>(), vec!["@l"]);
    }

    #[rstest]
    fn test_help_lists_aliases(group: CommandGroup<'static>) {
        let mut out = Vec::new();
        group.help(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("pgcrust:\n"));
        assert!(text.contains("  @l\t\tList databases\n"));
        assert!(text.contains("  @du\t\tList roles\n"));
    }

    #[rstest]
    fn test_describe(group: CommandGroup<'static>) {
        let mut out = Vec::new();
        group.describe(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "  pgcrust:\tpgcrust commands\n");
    }
}
