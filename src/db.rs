//! Backend access: the single session connection and the queries the
//! built-in commands run on it.

use crate::connection_string::{has_password, to_connect_options};
use crate::format::{ColumnHeader, FormatterOptions, QueryOutput, print_result};
use crate::password_sanitizer::sanitize_text_for_logging;
use crate::session::{ConnectError, ConnectionOptions, Connector, TerminalPasswordPrompt, establish};
use futures_util::TryStreamExt;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, ConnectOptions, Either, Executor, Row, TypeInfo};
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::{debug, error};

const SQLSTATE_INVALID_PASSWORD: &str = "28P01";

const LIST_DATABASES_SQL: &str = r#"
SELECT d.datname as "Name",
       pg_catalog.pg_get_userbyid(d.datdba) as "Owner",
       pg_catalog.pg_encoding_to_char(d.encoding) as "Encoding",
       d.datcollate as "Collate",
       d.datctype as "Ctype",
       pg_catalog.array_to_string(d.datacl, E'\n') AS "Access privileges"
FROM pg_catalog.pg_database d
ORDER BY 1;
"#;

const LIST_SCHEMAS_SQL: &str = r#"
SELECT n.nspname AS "Name",
  pg_catalog.pg_get_userbyid(n.nspowner) AS "Owner"
FROM pg_catalog.pg_namespace n
WHERE n.nspname !~ '^pg_' AND n.nspname <> 'information_schema'
ORDER BY 1;
"#;

const LIST_ROLES_SQL: &str = r#"
SELECT r.rolname, r.rolsuper, r.rolinherit,
  r.rolcreaterole, r.rolcreatedb, r.rolcanlogin,
  r.rolconnlimit, r.rolvaliduntil,
  ARRAY(SELECT b.rolname
        FROM pg_catalog.pg_auth_members m
        JOIN pg_catalog.pg_roles b ON (m.roleid = b.oid)
        WHERE m.member = r.oid) as memberof,
  r.rolreplication,
  r.rolbypassrls
FROM pg_catalog.pg_roles r
WHERE r.rolname !~ '^pg_'
ORDER BY 1;
"#;

const CONNECTION_INFO_SQL: &str =
    "SELECT current_database(), current_user, current_setting('port');";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("could not connect to the database")]
    NotConnected,
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to open out file '{path}': {source}")]
    OutFile {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Query(String),
}

/// Everything the proxy needs to know from the command line.
#[derive(Debug, Clone, Default)]
pub struct DbProxyOptions {
    pub connection_options: ConnectionOptions,
    pub format_options: FormatterOptions,
    /// Commands given with `-c`, run in order before exiting.
    pub commands: Vec<String>,
    /// File given with `-f`; one command per line.
    pub command_file: String,
    pub list_dbs_and_exit: bool,
}

/// Map a sqlx connection error onto the bootstrap's two failure classes.
pub fn classify_connect_error(error: &sqlx::Error, supplied: bool) -> ConnectError {
    let message = sanitize_text_for_logging(&error.to_string());
    let sqlstate = error.as_database_error().and_then(|e| e.code());

    if is_missing_password(&message, sqlstate.as_deref(), supplied) {
        ConnectError::MissingPassword(message)
    } else {
        ConnectError::Other(message)
    }
}

/// sqlx answers a password challenge with an empty password when none is
/// configured, so the server's "invalid password" reply is the missing
/// password signal whenever no password was supplied.
pub fn is_missing_password(message: &str, sqlstate: Option<&str>, supplied: bool) -> bool {
    message.contains("no password supplied")
        || (sqlstate == Some(SQLSTATE_INVALID_PASSWORD) && !supplied)
}

/// Whether a password reaches the server without prompting: in the
/// descriptor itself or through `PGPASSWORD`.
pub fn password_supplied(descriptor: &str, env_password: Option<&str>) -> bool {
    has_password(descriptor) || env_password.is_some_and(|p| !p.is_empty())
}

/// [`Connector`] opening a single `PgConnection` on a blocking runtime.
pub struct PgConnector<'rt> {
    runtime: &'rt Runtime,
}

impl<'rt> PgConnector<'rt> {
    pub fn new(runtime: &'rt Runtime) -> Self {
        Self { runtime }
    }
}

impl Connector for PgConnector<'_> {
    type Connection = PgConnection;

    fn connect(&mut self, descriptor: &str) -> Result<PgConnection, ConnectError> {
        let options =
            to_connect_options(descriptor).map_err(|e| ConnectError::Other(e.to_string()))?;
        self.runtime
            .block_on(options.connect())
            .map_err(|e| {
                let env_password = std::env::var("PGPASSWORD").ok();
                classify_connect_error(&e, password_supplied(descriptor, env_password.as_deref()))
            })
    }
}

/// Owns the session's connection and output sink.
///
/// Single threaded: the connection and the sink sit behind `RefCell`s so the
/// command actions can share one `&DbProxy`.
pub struct DbProxy {
    options: DbProxyOptions,
    runtime: Runtime,
    connection: RefCell<PgConnection>,
    out: RefCell<Box<dyn Write>>,
}

impl DbProxy {
    /// Connect (prompting for a password if needed) and open the output sink.
    pub fn connect(options: DbProxyOptions) -> Result<Self, DbError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(DbError::Runtime)?;

        let connection = {
            let mut connector = PgConnector::new(&runtime);
            establish(
                &options.connection_options,
                &mut connector,
                &mut TerminalPasswordPrompt,
            )
        }
        .ok_or(DbError::NotConnected)?;

        let out: Box<dyn Write> = if options.format_options.out_file.is_empty() {
            Box::new(io::stdout())
        } else {
            let path = options.format_options.out_file.clone();
            let file = File::create(&path).map_err(|source| DbError::OutFile { path, source })?;
            Box::new(BufWriter::new(file))
        };

        Ok(Self {
            options,
            runtime,
            connection: RefCell::new(connection),
            out: RefCell::new(out),
        })
    }

    pub fn options(&self) -> &DbProxyOptions {
        &self.options
    }

    /// Run `sql` on the session connection and collect every result set.
    pub fn query(&self, sql: &str) -> Result<Vec<QueryOutput>, DbError> {
        let mut connection = self.connection.borrow_mut();
        let items = self
            .runtime
            .block_on(
                (&mut *connection)
                    .fetch_many(sqlx::raw_sql(sql))
                    .try_collect::<Vec<_>>(),
            )
            .map_err(|e| DbError::Query(e.to_string()))?;

        let mut outputs = Vec::new();
        let mut current = QueryOutput::default();
        for item in items {
            match item {
                Either::Left(done) => {
                    current.rows_affected = done.rows_affected();
                    outputs.push(std::mem::take(&mut current));
                }
                Either::Right(row) => {
                    if current.columns.is_empty() {
                        current.columns = column_headers(&row);
                    }
                    current.rows.push(row_values(&row));
                }
            }
        }
        if current.returns_rows() {
            outputs.push(current);
        }
        Ok(outputs)
    }

    /// Execute `sql` and print its results. Errors are reported, not raised.
    pub fn do_transaction(&self, sql: &str, title: &str) -> bool {
        debug!(sql, "executing");
        let outputs = match self.query(sql) {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("query failed: {e}");
                eprintln!("{e}");
                return false;
            }
        };

        if let Err(e) = self.print_outputs(&outputs, title) {
            eprintln!("Failed to write result: {e}");
            return false;
        }
        true
    }

    fn print_outputs(&self, outputs: &[QueryOutput], title: &str) -> io::Result<()> {
        let mut out = self.out.borrow_mut();
        for output in outputs {
            print_result(output, &self.options.format_options, &mut **out, title)?;
        }
        out.flush()
    }

    pub fn list_dbs(&self) -> bool {
        self.do_transaction(LIST_DATABASES_SQL, "List of databases")
    }

    pub fn list_roles(&self) -> bool {
        self.do_transaction(LIST_ROLES_SQL, "List of roles")
    }

    pub fn list_schemas(&self) -> bool {
        self.do_transaction(LIST_SCHEMAS_SQL, "List of schemas")
    }

    fn connection_info(&self) -> Result<(String, String, String), DbError> {
        let outputs = self.query(CONNECTION_INFO_SQL)?;
        let row = outputs
            .into_iter()
            .find_map(|output| output.rows.into_iter().next())
            .ok_or_else(|| DbError::Query("no connection information returned".to_string()))?;
        let mut values = row.into_iter().map(Option::unwrap_or_default);
        let mut next = || values.next().unwrap_or_default();
        Ok((next(), next(), next()))
    }

    pub fn print_connection_info(&self) -> bool {
        match self.connection_info() {
            Ok((dbname, user, port)) => {
                let mut out = self.out.borrow_mut();
                writeln!(
                    out,
                    "You are connected to database \"{dbname}\" as user \"{user}\" at port \"{port}\"."
                )
                .and_then(|_| out.flush())
                .is_ok()
            }
            Err(e) => {
                eprintln!("{e}");
                false
            }
        }
    }

    /// Name of the connected database, empty if it cannot be determined.
    pub fn db_name(&self) -> String {
        self.connection_info().map(|(db, _, _)| db).unwrap_or_default()
    }

    pub fn user_name(&self) -> String {
        self.connection_info().map(|(_, user, _)| user).unwrap_or_default()
    }
}

fn column_headers(row: &PgRow) -> Vec<ColumnHeader> {
    row.columns()
        .iter()
        .map(|column| ColumnHeader::new(column.name(), column.type_info().name()))
        .collect()
}

/// Text of every cell. `raw_sql` uses the simple query protocol, so values
/// arrive in text format and decode as strings whatever their SQL type.
fn row_values(row: &PgRow) -> Vec<Option<String>> {
    (0..row.len())
        .map(|i| row.try_get_unchecked::<Option<String>, _>(i).ok().flatten())
        .collect()
}
