//! SQLite store backend.
//!
//! Geometries are stored as SRID-prefixed WKT text (`SRID=4326;POINT(1 2)`)
//! and the spatial SQL functions the engine emits are registered on every
//! connection, so the same statements run here and against PostGIS.

mod functions;
mod transform;
mod values;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use featureserver_core::Value;
use rusqlite::{
    Connection, ErrorCode, OpenFlags, OptionalExtension, ToSql, params, params_from_iter,
    types::{ToSqlOutput, ValueRef},
};

use crate::{
    connection::{CONNECTION_FAILURE, Params, QueryRows, Store, StoreConnection, StoreError, StoreValue},
    placeholder::bind_positional,
};
use values::{Declared, store_value};

pub use functions::register_spatial_functions;
pub use transform::{SpatialFunctionError, reproject};

const SYNTAX_ERROR: &str = "42000";
const INSUFFICIENT_PRIVILEGE: &str = "42501";
const INTEGRITY_CONSTRAINT: &str = "23000";
const DATA_EXCEPTION: &str = "22000";

/// Connection factory for an SQLite database file.
///
/// The file must already exist; connections open it read-write.
#[derive(Clone, PartialEq, Eq)]
pub struct SqliteStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// A store over the database at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            flags: OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }

    /// A store that only reads; writes fail with an access error.
    #[must_use]
    pub fn read_only(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            flags: OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }

    /// Database file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for SqliteStore {
    type Connection = SqliteConnection;

    fn connect(&self) -> Result<SqliteConnection, StoreError> {
        let connection = Connection::open_with_flags(&self.path, self.flags).map_err(|err| {
            StoreError::with_code(
                CONNECTION_FAILURE,
                format!("failed to open {}: {err}", self.path.display()),
            )
        })?;
        register_spatial_functions(&connection).map_err(store_error)?;
        connection.execute_batch("BEGIN").map_err(store_error)?;
        Ok(SqliteConnection { connection })
    }
}

/// An open SQLite connection inside a transaction.
pub struct SqliteConnection {
    connection: Connection,
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

struct Bind<'a>(&'a Value);

impl ToSql for Bind<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(flag) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*flag))),
            Value::Integer(number) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*number)),
            Value::Real(number) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*number)),
            Value::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Value::DateTime(_) => ToSqlOutput::Owned(rusqlite::types::Value::Text(self.0.to_string())),
        })
    }
}

fn positional(position: usize) -> String {
    format!("?{position}")
}

impl StoreConnection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, StoreError> {
        let statement = bind_positional(sql, params, positional)?;
        let changed = self
            .connection
            .execute(
                &statement.sql,
                params_from_iter(statement.values.iter().map(Bind)),
            )
            .map_err(store_error)?;
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<QueryRows, StoreError> {
        let bound = bind_positional(sql, params, positional)?;
        let mut statement = self.connection.prepare(&bound.sql).map_err(store_error)?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let declared: Vec<Declared> = statement
            .columns()
            .iter()
            .map(|column| Declared::from_decl_type(column.decl_type()))
            .collect();
        let mut rows = statement
            .query(params_from_iter(bound.values.iter().map(Bind)))
            .map_err(store_error)?;
        let mut values = Vec::new();
        while let Some(row) = rows.next().map_err(store_error)? {
            let mut record = Vec::with_capacity(declared.len());
            for (index, kind) in declared.iter().enumerate() {
                record.push(store_value(*kind, row.get_ref(index).map_err(store_error)?));
            }
            values.push(record);
        }
        Ok(QueryRows {
            columns,
            rows: values,
        })
    }

    fn sequence_value(&mut self, _sequence: &str) -> Result<StoreValue, StoreError> {
        Ok(StoreValue::Integer(self.connection.last_insert_rowid()))
    }

    fn column_type(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<String>, StoreError> {
        self.connection
            .query_row(
                "SELECT type FROM pragma_table_info(?1, ?2) WHERE name = ?3",
                params![table, schema, column],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(store_error)
    }

    fn commit(self) -> Result<(), StoreError> {
        self.connection.execute_batch("COMMIT").map_err(store_error)
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.connection
            .execute_batch("ROLLBACK")
            .map_err(store_error)
    }
}

const fn sqlstate(code: ErrorCode) -> Option<&'static str> {
    match code {
        ErrorCode::Unknown => Some(SYNTAX_ERROR),
        ErrorCode::PermissionDenied
        | ErrorCode::ReadOnly
        | ErrorCode::AuthorizationForStatementDenied => Some(INSUFFICIENT_PRIVILEGE),
        ErrorCode::CannotOpen | ErrorCode::NotADatabase => Some(CONNECTION_FAILURE),
        ErrorCode::ConstraintViolation => Some(INTEGRITY_CONSTRAINT),
        ErrorCode::TypeMismatch | ErrorCode::TooBig => Some(DATA_EXCEPTION),
        _ => None,
    }
}

/// Map an SQLite failure onto a SQLSTATE-style [`StoreError`].
///
/// Generic `SQLITE_ERROR` results, which cover unknown tables and columns,
/// bad syntax and errors raised by the spatial functions, land in class 42.
fn store_error(err: rusqlite::Error) -> StoreError {
    let code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => sqlstate(failure.code),
        rusqlite::Error::SqlInputError { error, .. } => sqlstate(error.code),
        rusqlite::Error::InvalidColumnName(_) | rusqlite::Error::InvalidParameterName(_) => {
            Some(SYNTAX_ERROR)
        }
        _ => None,
    };
    StoreError {
        code: code.map(str::to_owned),
        message: err.to_string(),
    }
}
