use clap::{Parser, ValueEnum};
use pgcrust::config::{Config, EditorMode};
use pgcrust::db::DbProxyOptions;
use pgcrust::format::FormatterOptions;
use pgcrust::password_sanitizer::sanitize_connection_string;
use pgcrust::session::ConnectionOptions;

/// pgcrust - yet another command-line interface to PostgreSQL
#[derive(Parser, Clone)]
#[command(name = "pgcrust")]
#[command(version, long_about = None)]
#[command(about = "Interactive PostgreSQL shell with psql-style meta-commands")]
pub struct Args {
    /// PQ connection string, as a URL or as key=value pairs
    ///
    /// Examples:
    ///   postgresql://user@localhost:5432/mydb
    ///   host=localhost dbname=mydb user=me
    ///
    /// By default the client connects to a server on the local machine.
    #[arg(short = 'S', long, default_value = "", env = "PGCRUST_CONNECTION")]
    pub connection_string: String,

    /// Never prompt for password
    #[arg(short = 'w', long)]
    pub no_password: bool,

    /// List available databases, then exit
    #[arg(short, long)]
    pub list_dbs: bool,

    /// Run only single command (SQL or internal) and exit; repeatable
    #[arg(short, long, value_name = "COMMAND", action = clap::ArgAction::Append)]
    pub command: Vec<String>,

    /// Execute commands from file, then exit
    #[arg(short = 'f', long, value_name = "FILE", default_value = "")]
    pub command_file: String,

    /// Send query results to file
    #[arg(short, long, value_name = "FILE", default_value = "")]
    pub output: String,

    /// Field separator for unaligned output
    #[arg(short = 'F', long, default_value = "|")]
    pub field_separator: String,

    /// Unaligned table output mode
    #[arg(short = 'A', long)]
    pub no_align: bool,

    /// Print rows only
    #[arg(short, long)]
    pub tuples_only: bool,

    /// Line editing mode (overrides config.toml)
    #[arg(long, value_enum)]
    pub editor: Option<EditorMode>,

    /// History file (overrides config.toml)
    #[arg(long, value_name = "FILE")]
    pub history_file: Option<String>,

    /// Maximum number of history entries (overrides config.toml)
    #[arg(long)]
    pub history_size: Option<usize>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Generate shell completions
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

impl Args {
    pub fn db_proxy_options(&self) -> DbProxyOptions {
        DbProxyOptions {
            connection_options: ConnectionOptions {
                base_connection_string: self.connection_string.clone(),
                prompt_for_password: !self.no_password,
            },
            format_options: FormatterOptions {
                out_file: self.output.clone(),
                delimiter: self.field_separator.clone(),
                show_title_and_summary: !self.tuples_only,
                no_align: self.no_align,
            },
            commands: self.command.clone(),
            command_file: self.command_file.clone(),
            list_dbs_and_exit: self.list_dbs,
        }
    }

    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(editor) = self.editor {
            config.cli.editor = editor;
        }
        if let Some(history_file) = &self.history_file {
            config.cli.history_file = history_file.clone();
        }
        if let Some(history_size) = self.history_size {
            config.cli.history_size = history_size;
        }
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field(
                "connection_string",
                &sanitize_connection_string(&self.connection_string),
            )
            .field("no_password", &self.no_password)
            .field("list_dbs", &self.list_dbs)
            .field("command", &self.command)
            .field("command_file", &self.command_file)
            .field("output", &self.output)
            .field("field_separator", &self.field_separator)
            .field("no_align", &self.no_align)
            .field("tuples_only", &self.tuples_only)
            .field("editor", &self.editor)
            .field("history_file", &self.history_file)
            .field("history_size", &self.history_size)
            .field("debug", &self.debug)
            .field("completions", &self.completions)
            .finish()
    }
}

/// Supported shells for completion generation
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl From<Shell> for clap_complete::Shell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}
