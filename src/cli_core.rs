//! Line handling for the shell: the reserved `@help`/`@q` meta-commands,
//! dispatch of everything else, batch execution, and the interactive loop.

use crate::command::CommandResult;
use crate::command_group::CommandGroup;
use crate::completion::CommandCompleter;
use crate::config::{Config, EditorMode};
use crate::dispatcher::Dispatcher;
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, DefaultHinter, EditMode, Emacs, FileBackedHistory, KeyCode, KeyModifiers,
    Keybindings, MenuBuilder, Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Vi,
    default_emacs_keybindings, default_vi_insert_keybindings, default_vi_normal_keybindings,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const HELP_COMMAND: &str = "@help";
pub const QUIT_COMMAND: &str = "@q";

const COMPLETION_MENU: &str = "completion_menu";

/// Split a line into words on runs of whitespace. Quotes are not interpreted.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// What the caller should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue(CommandResult),
    Exit,
}

impl LineOutcome {
    /// Result to report for the process; quitting counts as success.
    pub fn result(self) -> CommandResult {
        match self {
            LineOutcome::Continue(result) => result,
            LineOutcome::Exit => CommandResult::Success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub editor: EditorMode,
    pub history_file: PathBuf,
    pub history_size: usize,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CliOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            editor: config.cli.editor,
            history_file: config.history_path(),
            history_size: config.cli.history_size,
        }
    }
}

pub struct Cli<'a> {
    options: CliOptions,
    dispatcher: Dispatcher<'a>,
}

impl<'a> Cli<'a> {
    pub fn new(options: CliOptions) -> Self {
        Self {
            options,
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn options(&self) -> &CliOptions {
        &self.options
    }

    pub fn dispatcher(&self) -> &Dispatcher<'a> {
        &self.dispatcher
    }

    pub fn register_command_group(&mut self, group: CommandGroup<'a>) {
        self.dispatcher.register_group(group);
    }

    /// Handle one input line, writing meta-command output to `out` and
    /// diagnostics to `err`. Blank lines succeed without doing anything.
    pub fn run_line(&self, line: &str, out: &mut dyn Write, err: &mut dyn Write) -> LineOutcome {
        let words = tokenize(line);
        let Some(&first) = words.first() else {
            return LineOutcome::Continue(CommandResult::Success);
        };

        match first {
            QUIT_COMMAND => LineOutcome::Exit,
            HELP_COMMAND => LineOutcome::Continue(self.help(&words, out, err)),
            _ => {
                let result = self.dispatcher.resolve_and_run(&words);
                if result == CommandResult::Unknown {
                    debug!(command = %first, "no group accepted the input");
                    let _ = writeln!(err, "Unknown command \"{first}\"");
                }
                LineOutcome::Continue(result)
            }
        }
    }

    fn help(&self, words: &[&str], out: &mut dyn Write, err: &mut dyn Write) -> CommandResult {
        match words {
            [_] => self.dispatcher.help_groups("", out, err),
            [_, group] => self.dispatcher.help_groups(group, out, err),
            _ => {
                let given = words.len() - 1;
                warn!(command = HELP_COMMAND, expected = 1, given, "too many arguments");
                let _ = writeln!(
                    err,
                    "Command ({HELP_COMMAND}) failed: Too many arguments. Expected 1, but {given} were given."
                );
                CommandResult::Failure
            }
        }
    }

    /// Run lines in order, stopping at `@q` (reported as [`LineOutcome::Exit`])
    /// or at the first line that does not succeed. Blank lines are skipped.
    pub fn run_batch<I, S>(&self, lines: I) -> LineOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stdout = io::stdout();
        let stderr = io::stderr();

        for line in lines {
            let line = line.as_ref();
            match self.run_line(line, &mut stdout.lock(), &mut stderr.lock()) {
                LineOutcome::Exit => return LineOutcome::Exit,
                LineOutcome::Continue(CommandResult::Success) => {}
                LineOutcome::Continue(result) => {
                    debug!(?result, "batch stopped");
                    return LineOutcome::Continue(result);
                }
            }
        }
        LineOutcome::Continue(CommandResult::Success)
    }

    /// Interactive loop. Ctrl-C discards the current line, Ctrl-D and `@q` exit.
    pub fn run(&self, prompt: &dyn Prompt) -> io::Result<()> {
        let mut line_editor = self.line_editor();
        let stdout = io::stdout();
        let stderr = io::stderr();

        info!("entering interactive loop");
        loop {
            match line_editor.read_line(prompt)? {
                Signal::Success(buffer) => {
                    let outcome = self.run_line(&buffer, &mut stdout.lock(), &mut stderr.lock());
                    if outcome == LineOutcome::Exit {
                        break;
                    }
                }
                Signal::CtrlC => continue,
                Signal::CtrlD => break,
            }
        }
        info!("leaving interactive loop");
        Ok(())
    }

    fn line_editor(&self) -> Reedline {
        let completer = CommandCompleter::new(&self.dispatcher).with_reserved(&[
            (HELP_COMMAND, "Show help, optionally for one group"),
            (QUIT_COMMAND, "Quit"),
        ]);
        let completion_menu = Box::new(ColumnarMenu::default().with_name(COMPLETION_MENU));
        let hinter =
            Box::new(DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)));

        Reedline::create()
            .with_completer(Box::new(completer))
            .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
            .with_hinter(hinter)
            .with_edit_mode(self.edit_mode())
            .with_history(self.history())
    }

    fn edit_mode(&self) -> Box<dyn EditMode> {
        match self.options.editor {
            EditorMode::Emacs => {
                let mut keybindings = default_emacs_keybindings();
                add_completion_bindings(&mut keybindings);
                Box::new(Emacs::new(keybindings))
            }
            EditorMode::Vi => {
                let mut insert = default_vi_insert_keybindings();
                add_completion_bindings(&mut insert);
                Box::new(Vi::new(insert, default_vi_normal_keybindings()))
            }
        }
    }

    fn history(&self) -> Box<FileBackedHistory> {
        let path = &self.options.history_file;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("cannot create history directory {}: {e}", parent.display());
            }
        }

        match FileBackedHistory::with_file(self.options.history_size, path.clone()) {
            Ok(history) => Box::new(history),
            Err(e) => {
                warn!("cannot use history file {}: {e}", path.display());
                Box::new(FileBackedHistory::default())
            }
        }
    }
}

fn add_completion_bindings(keybindings: &mut Keybindings) {
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu(COMPLETION_MENU.to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );
    keybindings.add_binding(
        KeyModifiers::SHIFT,
        KeyCode::BackTab,
        ReedlineEvent::MenuPrevious,
    );
}
