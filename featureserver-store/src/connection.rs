//! The seam between the query engine and a concrete relational store.
//!
//! The engine speaks PostGIS-flavoured SQL with `%(name)s` placeholders and
//! never touches a driver directly. A backend implements [`Store`] to hand
//! out connections and [`StoreConnection`] to run statements inside the
//! transaction each connection opens on creation.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use featureserver_core::Value;
use rust_decimal::Decimal;
use thiserror::Error;

/// SQLSTATE class for syntax errors and access rule violations.
pub const SYNTAX_OR_ACCESS_CLASS: &str = "42";

/// SQLSTATE used when a connection cannot be established.
pub const CONNECTION_FAILURE: &str = "08006";

/// SQLSTATE used when a statement names a parameter that was not bound.
pub const UNDEFINED_PARAMETER: &str = "42P02";

/// Failure reported by a store backend.
///
/// `code` carries a SQLSTATE-style diagnostic when the backend can provide
/// one; the engine inspects only its two-character class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    /// SQLSTATE-style code, when known.
    pub code: Option<String>,
    /// Backend diagnostic text.
    pub message: String,
}

impl StoreError {
    /// An error with a diagnostic code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// An error without a diagnostic code.
    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Whether the code falls in the syntax-error/access-rule class.
    #[must_use]
    pub fn is_syntax_or_access_violation(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| code.starts_with(SYNTAX_OR_ACCESS_CLASS))
    }
}

/// Named statement parameters in binding order.
///
/// # Examples
/// ```
/// use featureserver_core::Value;
/// use featureserver_store::Params;
///
/// let mut params = Params::new();
/// params.bind("name", "harbour");
/// params.bind("name", "quay");
/// assert_eq!(params.get("name"), Some(&Value::from("quay")));
/// assert_eq!(params.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// No parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Bind `value` under `name`, replacing an earlier binding of the same name.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let key = name.into();
        let bound = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = bound,
            None => self.entries.push((key, bound)),
        }
    }

    /// The value bound under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Number of bindings.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Append every binding of `other`.
    pub fn extend(&mut self, other: Self) {
        for (key, value) in other.entries {
            self.bind(key, value);
        }
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value:?}")?;
        }
        f.write_str("}")
    }
}

/// A raw column value as returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    /// SQL `NULL`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Floating point.
    Real(f64),
    /// Exact numeric.
    Decimal(Decimal),
    /// Text.
    Text(String),
    /// Undecoded byte string.
    Bytes(Vec<u8>),
    /// Date.
    Date(NaiveDate),
    /// Timestamp without zone.
    Timestamp(NaiveDateTime),
}

impl StoreValue {
    /// Whether the value is `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Column names and rows of a query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    /// Column labels in projection order.
    pub columns: Vec<String>,
    /// Row values, each aligned with `columns`.
    pub rows: Vec<Vec<StoreValue>>,
}

impl QueryRows {
    /// The first column of the first row.
    #[must_use]
    pub fn scalar(&self) -> Option<&StoreValue> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Rows as `(column, value)` records.
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &StoreValue)>> {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter())
                .collect()
        })
    }
}

/// A factory for store connections.
pub trait Store {
    /// Connection type handed out by this store.
    type Connection: StoreConnection;

    /// Open a connection with a transaction already in progress.
    ///
    /// # Errors
    /// Returns the backend failure when the store cannot be reached.
    fn connect(&self) -> Result<Self::Connection, StoreError>;
}

/// One open connection with an active transaction.
///
/// Statements use `%(name)s` placeholders resolved against [`Params`].
/// `commit` and `rollback` end the transaction and close the connection.
pub trait StoreConnection {
    /// Run a statement that returns no rows; yields the affected row count.
    ///
    /// # Errors
    /// Returns the backend failure, or an [`UNDEFINED_PARAMETER`] error when
    /// a placeholder has no binding.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, StoreError>;

    /// Run a statement that returns rows.
    ///
    /// # Errors
    /// As for [`StoreConnection::execute`].
    fn query(&mut self, sql: &str, params: &Params) -> Result<QueryRows, StoreError>;

    /// Current value of the named identifier sequence in this session.
    ///
    /// # Errors
    /// Returns the backend failure when the sequence has no current value.
    fn sequence_value(&mut self, sequence: &str) -> Result<StoreValue, StoreError>;

    /// Declared type name of a column, or `None` when the catalog has no entry.
    ///
    /// # Errors
    /// Returns the backend failure when the catalog cannot be queried.
    fn column_type(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Commit the transaction and close the connection.
    ///
    /// # Errors
    /// Returns the backend failure when the commit is refused.
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;

    /// Roll the transaction back and close the connection.
    ///
    /// # Errors
    /// Returns the backend failure when the rollback fails.
    fn rollback(self) -> Result<(), StoreError>
    where
        Self: Sized;

    /// Open a nested savepoint.
    ///
    /// # Errors
    /// Returns the backend failure.
    fn savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        self.execute(&format!("SAVEPOINT {name}"), &Params::new())
            .map(|_| ())
    }

    /// Keep the work done since the savepoint.
    ///
    /// # Errors
    /// Returns the backend failure.
    fn release_savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        self.execute(&format!("RELEASE SAVEPOINT {name}"), &Params::new())
            .map(|_| ())
    }

    /// Discard the work done since the savepoint.
    ///
    /// # Errors
    /// Returns the backend failure.
    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {name}"), &Params::new())
            .map(|_| ())
    }
}
