mod cli;

use clap::{CommandFactory, Parser};
use cli::Args;
use pgcrust::cli_core::{Cli, CliOptions, LineOutcome};
use pgcrust::command::CommandResult;
use pgcrust::config::Config;
use pgcrust::db::{DbError, DbProxy};
use pgcrust::logging;
use pgcrust::meta_commands::create_psql_command_group;
use pgcrust::prompt::DbPrompt;
use std::error::Error as StdError;
use std::fs;
use std::io;
use std::process::ExitCode;
use tracing::{debug, info};

fn main() -> Result<ExitCode, Box<dyn StdError>> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        let mut command = Args::command();
        clap_complete::generate(
            clap_complete::Shell::from(shell),
            &mut command,
            "pgcrust",
            &mut io::stdout(),
        );
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::load();
    args.apply_to(&mut config);

    if let Err(e) = logging::init(&config.logging, args.debug) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }
    debug!(?args, "parsed arguments");

    let options = args.db_proxy_options();
    let proxy = match DbProxy::connect(options) {
        Ok(proxy) => proxy,
        // The bootstrap has already printed the server's diagnostic.
        Err(DbError::NotConnected) => return Ok(ExitCode::FAILURE),
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(database = %proxy.db_name(), user = %proxy.user_name(), "connected");

    if proxy.options().list_dbs_and_exit {
        return Ok(to_exit_code(CommandResult::from_success(proxy.list_dbs())));
    }

    let mut cli = Cli::new(CliOptions::from_config(&config));
    cli.register_command_group(create_psql_command_group(&proxy)?);

    let commands = &proxy.options().commands;
    let command_file = &proxy.options().command_file;

    if !commands.is_empty() || !command_file.is_empty() {
        let mut outcome = cli.run_batch(commands);
        if outcome == LineOutcome::Continue(CommandResult::Success) && !command_file.is_empty() {
            let script = fs::read_to_string(command_file)
                .map_err(|e| format!("failed to read command file '{command_file}': {e}"))?;
            outcome = cli.run_batch(script.lines());
        }
        return Ok(to_exit_code(outcome.result()));
    }

    cli.run(&DbPrompt::new(proxy.db_name()))?;
    Ok(ExitCode::SUCCESS)
}

fn to_exit_code(result: CommandResult) -> ExitCode {
    ExitCode::from(result.exit_code())
}
