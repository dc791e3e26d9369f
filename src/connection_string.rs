//! Connection descriptor handling.
//!
//! A descriptor is either a URL (`postgresql://...`, `postgres://...`) or a
//! libpq style `key=value` list. The shell treats it as opaque except for
//! merging in a prompted password and turning it into sqlx options.

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::str::FromStr;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::warn;

const URL_SCHEMES: [&str; 2] = ["postgresql://", "postgres://"];

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("invalid connection URL: {0}")]
    InvalidUrl(String),
    #[error("missing \"=\" after \"{0}\" in connection info string")]
    MissingEquals(String),
    #[error("unterminated quoted string in connection info string")]
    UnterminatedQuote,
    #[error("invalid connection option \"{0}\"")]
    UnknownKey(String),
    #[error("invalid {key} value: \"{value}\"")]
    InvalidValue { key: String, value: String },
}

/// libpq keywords that sqlx has no setting for. They are accepted and
/// ignored so that descriptors written for psql still connect.
const IGNORED_LIBPQ_KEYS: [&str; 13] = [
    "connect_timeout",
    "target_session_attrs",
    "keepalives",
    "keepalives_idle",
    "keepalives_interval",
    "keepalives_count",
    "client_encoding",
    "gssencmode",
    "sslcompression",
    "sslcrl",
    "service",
    "passfile",
    "tcp_user_timeout",
];

/// Connection parameters the shell composes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DbParameterKey {
    Host,
    Port,
    Dbname,
    User,
    Password,
}

/// `key=value` fragment for a parameter.
pub fn compose_db_parameter(key: DbParameterKey, value: &str) -> String {
    format!("{key}={value}")
}

pub fn is_url(descriptor: &str) -> bool {
    URL_SCHEMES.iter().any(|scheme| descriptor.starts_with(scheme))
}

/// Append `password` to a descriptor.
///
/// URLs get `?password=` or `&password=` depending on whether a query is
/// already present; key=value descriptors get ` password=`. The value is
/// appended as is: neither quoted nor percent-encoded.
pub fn override_password(connection_string: &str, password: &str) -> String {
    let mut merged = connection_string.to_string();

    if is_url(connection_string) {
        merged.push(if connection_string.contains('?') { '&' } else { '?' });
    } else if !connection_string.is_empty() {
        merged.push(' ');
    }

    merged.push_str(&compose_db_parameter(DbParameterKey::Password, password));
    merged
}

/// Whether the descriptor already carries a password.
pub fn has_password(descriptor: &str) -> bool {
    if is_url(descriptor) {
        return match url::Url::parse(descriptor) {
            Ok(parsed) => {
                parsed.password().is_some()
                    || parsed.query_pairs().any(|(key, _)| key == "password")
            }
            Err(_) => descriptor.contains("password="),
        };
    }

    parse_key_values(descriptor)
        .map(|pairs| pairs.iter().any(|(key, _)| key == "password"))
        .unwrap_or(false)
}

/// Split a libpq `key=value` descriptor into pairs.
///
/// Values may be single-quoted; inside quotes, and in bare values, a
/// backslash escapes the next character. Whitespace around `=` is allowed.
pub fn parse_key_values(descriptor: &str) -> Result<Vec<(String, String)>, DescriptorError> {
    let mut pairs = Vec::new();
    let mut chars = descriptor.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next_if_eq(&'=').is_none() {
            return Err(DescriptorError::MissingEquals(key));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '\'' => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(DescriptorError::UnterminatedQuote);
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

/// Build sqlx connection options from a descriptor.
///
/// An empty descriptor yields sqlx defaults, which read the usual `PG*`
/// environment variables and the password file.
pub fn to_connect_options(descriptor: &str) -> Result<PgConnectOptions, DescriptorError> {
    if is_url(descriptor) {
        return PgConnectOptions::from_str(descriptor)
            .map_err(|e| DescriptorError::InvalidUrl(e.to_string()));
    }

    let mut options = PgConnectOptions::new();
    for (key, value) in parse_key_values(descriptor)? {
        let invalid = || DescriptorError::InvalidValue {
            key: key.clone(),
            value: value.clone(),
        };
        options = match key.as_str() {
            "host" | "hostaddr" => options.host(&value),
            "port" => options.port(value.parse::<u16>().map_err(|_| invalid())?),
            "dbname" => options.database(&value),
            "user" => options.username(&value),
            "password" => options.password(&value),
            "application_name" => options.application_name(&value),
            "sslmode" => options.ssl_mode(PgSslMode::from_str(&value).map_err(|_| invalid())?),
            "sslrootcert" => options.ssl_root_cert(&value),
            "sslcert" => options.ssl_client_cert(&value),
            "sslkey" => options.ssl_client_key(&value),
            "options" => options.options(parse_server_options(&value).ok_or_else(invalid)?),
            "extra_float_digits" => {
                options.extra_float_digits(value.parse::<i8>().map_err(|_| invalid())?)
            }
            ignored if IGNORED_LIBPQ_KEYS.contains(&ignored) => {
                warn!(key = ignored, "connection option not supported, ignoring it");
                options
            }
            _ => return Err(DescriptorError::UnknownKey(key.clone())),
        };
    }

    Ok(options)
}

/// Split a libpq `options` value (`-c name=value`, `-cname=value` or
/// `--name=value`, space separated) into runtime parameter pairs.
fn parse_server_options(value: &str) -> Option<Vec<(String, String)>> {
    let mut parameters = Vec::new();
    let mut words = value.split_whitespace();

    while let Some(word) = words.next() {
        let setting = if word == "-c" {
            words.next()?
        } else if let Some(rest) = word.strip_prefix("--") {
            rest
        } else {
            word.strip_prefix("-c")?
        };
        let (name, value) = setting.split_once('=')?;
        if name.is_empty() {
            return None;
        }
        parameters.push((name.to_string(), value.to_string()));
    }

    Some(parameters)
}
