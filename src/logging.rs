use crate::config::{LogLevel, LoggingConfig};
use std::io;
use std::path::Path;
use std::sync::Once;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable overriding the configured filter, e.g. `PGCRUST_LOG=pgcrust=trace`.
pub const LOG_ENV_VAR: &str = "PGCRUST_LOG";

static INIT: Once = Once::new();

/// Filter directive for the configured level; `--debug` raises it to debug.
pub fn filter_directive(level: LogLevel, debug: bool) -> String {
    let level = if debug && !matches!(level, LogLevel::Trace) {
        LogLevel::Debug
    } else {
        level
    };
    level.to_string()
}

/// Install the global subscriber. Later calls are ignored.
///
/// Logs go to stderr unless `file_output` is set, in which case they are
/// appended to `file_path` (its directory is created if needed).
pub fn init(config: &LoggingConfig, debug: bool) -> io::Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(config.level, debug)));

        if config.file_output {
            let path = Path::new(&config.file_path);
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path.file_name().map(|n| n.to_os_string());

            let Some(file_name) = file_name else {
                result = Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid log file path '{}'", config.file_path),
                ));
                return;
            };
            if let Some(directory) = directory {
                if let Err(e) = std::fs::create_dir_all(directory) {
                    result = Err(e);
                    return;
                }
            }

            let appender =
                tracing_appender::rolling::never(directory.unwrap_or(Path::new(".")), file_name);
            let layer = fmt::layer().with_writer(appender).with_ansi(false);
            let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
        } else {
            let layer = fmt::layer().with_writer(io::stderr).with_target(false);
            let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
        }
    });

    result
}
