use crate::dispatcher::Dispatcher;
use nu_ansi_term::{Color, Style};
use reedline::{Completer, Span, Suggestion};

/// Completes the first word of a line against every registered alias.
///
/// Holds a snapshot of the aliases: the line editor needs a `Send`
/// completer, while command groups borrow the session's connection.
pub struct CommandCompleter {
    aliases: Vec<(String, String)>,
}

impl CommandCompleter {
    pub fn new(dispatcher: &Dispatcher<'_>) -> Self {
        let aliases = dispatcher
            .prefix_matches("")
            .into_iter()
            .map(|alias| {
                let description = dispatcher
                    .groups()
                    .iter()
                    .flat_map(|group| group.commands())
                    .find(|command| command.names().contains(&alias))
                    .map(|command| command.description().to_string())
                    .unwrap_or_default();
                (alias, description)
            })
            .collect();
        Self { aliases }
    }

    pub fn with_reserved(mut self, reserved: &[(&str, &str)]) -> Self {
        for (alias, description) in reserved {
            if !self.aliases.iter().any(|(known, _)| known == alias) {
                self.aliases.push((alias.to_string(), description.to_string()));
            }
        }
        self.aliases.sort();
        self
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let before = line.get(..pos).unwrap_or(line);
        let word_start = before.len() - before.trim_start().len();
        let word = &before[word_start..];

        // Only the command word is completed; arguments and SQL are left alone.
        if word.contains(char::is_whitespace) {
            return Vec::new();
        }

        self.aliases
            .iter()
            .filter(|(alias, _)| alias.starts_with(word))
            .map(|(alias, description)| Suggestion {
                value: alias.clone(),
                description: (!description.is_empty()).then(|| description.clone()),
                span: Span {
                    start: word_start,
                    end: pos,
                },
                append_whitespace: true,
                extra: None,
                style: Some(Style::new().fg(Color::Cyan)),
            })
            .collect()
    }
}
