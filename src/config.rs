use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to determine the configuration directory")]
    NoConfigDir,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[serde(rename = "trace")]
    Trace,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "info")]
    Info,
    #[default]
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Write logs to `file_path` instead of stderr.
    #[serde(default = "default_file_output")]
    pub file_output: bool,
    #[serde(default = "default_log_file_path")]
    pub file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::default(),
            file_output: default_file_output(),
            file_path: default_log_file_path(),
        }
    }
}

/// Line editing mode of the interactive loop.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Vi,
    Emacs,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default)]
    pub editor: EditorMode,
    /// Empty means `history` inside the config directory.
    #[serde(default)]
    pub history_file: String,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            editor: EditorMode::default(),
            history_file: String::new(),
            history_size: default_history_size(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub cli: CliConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_file_output() -> bool {
    false
}

fn default_log_file_path() -> String {
    match Config::get_config_directory() {
        Ok(config_dir) => config_dir.join("pgcrust.log").to_string_lossy().to_string(),
        Err(_) => "pgcrust.log".to_string(),
    }
}

fn default_history_size() -> usize {
    10000
}

fn get_config_dir_impl() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".config").join("pgcrust"))
}

impl Config {
    /// Configuration directory, `~/.config/pgcrust`. Not created here.
    pub fn get_config_directory() -> Result<PathBuf, ConfigError> {
        get_config_dir_impl().ok_or(ConfigError::NoConfigDir)
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::get_config_directory()?.join("config.toml"))
    }

    /// Default history location, used when no history file is configured.
    pub fn default_history_path() -> PathBuf {
        match Self::get_config_directory() {
            Ok(dir) => dir.join("history"),
            Err(_) => PathBuf::from(".pgcrust_history"),
        }
    }

    pub fn history_path(&self) -> PathBuf {
        if self.cli.history_file.is_empty() {
            Self::default_history_path()
        } else {
            PathBuf::from(&self.cli.history_file)
        }
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the user's config, warning and falling back to defaults on error.
    pub fn load() -> Self {
        let loaded = Self::get_config_path().and_then(|path| Self::load_from(&path));
        match loaded {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {e}. Using default configuration.");
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cli.editor, EditorMode::Vi);
        assert_eq!(config.cli.history_size, 10000);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"
[cli]
editor = "emacs"
history_file = "/tmp/pgcrust_history"
history_size = 50

[logging]
level = "debug"
file_output = true
file_path = "/tmp/pgcrust.log"
"#,
        );
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.cli.editor, EditorMode::Emacs);
        assert_eq!(config.cli.history_size, 50);
        assert_eq!(config.history_path(), PathBuf::from("/tmp/pgcrust_history"));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.file_output);
        assert_eq!(config.logging.file_path, "/tmp/pgcrust.log");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let file = write_config("[cli]\nhistory_size = 7\n");
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.cli.history_size, 7);
        assert_eq!(config.cli.editor, EditorMode::Vi);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[rstest]
    #[case("[cli]\neditor = \"nano\"\n")]
    #[case("[logging]\nlevel = \"loud\"\n")]
    #[case("not toml at all [")]
    fn test_invalid_config_is_a_parse_error(#[case] content: &str) {
        let file = write_config(content);
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_empty_history_file_uses_default_path() {
        let config = Config::default();
        assert_eq!(config.history_path(), Config::default_history_path());
    }

    #[rstest]
    #[case(LogLevel::Trace, "trace")]
    #[case(LogLevel::Warn, "warn")]
    #[case(LogLevel::Error, "error")]
    fn test_log_level_display(#[case] level: LogLevel, #[case] expected: &str) {
        assert_eq!(level.to_string(), expected);
    }
}
