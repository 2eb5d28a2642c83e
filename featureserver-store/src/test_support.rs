//! Fixtures shared by the unit tests of this crate.

#[cfg(feature = "store-sqlite")]
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::connection::{
    CONNECTION_FAILURE, Params, QueryRows, Store, StoreConnection, StoreError, StoreValue,
};

/// Create a layer table with `gid`, `name`, `pop` and `the_geom` columns.
#[cfg(feature = "store-sqlite")]
pub fn create_layer(path: &Path, table: &str) -> rusqlite::Result<()> {
    let connection = rusqlite::Connection::open(path)?;
    connection.execute_batch(&format!(
        "CREATE TABLE \"{table}\" (
            gid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            pop INTEGER,
            the_geom TEXT
        )"
    ))
}

/// Statement log shared between a [`RecordingStore`] and its connections.
pub type StatementLog = Arc<Mutex<Vec<String>>>;

/// Read the statements recorded so far.
#[must_use]
pub fn recorded(log: &StatementLog) -> Vec<String> {
    log.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// A [`Store`] that records every statement and fails on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    /// Statements and transaction commands in execution order.
    pub log: StatementLog,
    /// Statements containing any of these fragments fail with the paired error.
    pub failures: Vec<(String, StoreError)>,
    /// Whether `connect` fails.
    pub unreachable: bool,
    /// Type reported for every catalog lookup.
    pub column_type: Option<String>,
    /// Rows returned by every query.
    pub rows: QueryRows,
}

impl RecordingStore {
    /// Fail statements containing `fragment` with `error`.
    #[must_use]
    pub fn failing_on(mut self, fragment: &str, error: StoreError) -> Self {
        self.failures.push((fragment.to_owned(), error));
        self
    }
}

impl Store for RecordingStore {
    type Connection = RecordingConnection;

    fn connect(&self) -> Result<RecordingConnection, StoreError> {
        if self.unreachable {
            return Err(StoreError::with_code(CONNECTION_FAILURE, "connection refused"));
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push("BEGIN".to_owned());
        Ok(RecordingConnection {
            store: self.clone(),
        })
    }
}

/// Connection handed out by [`RecordingStore`].
#[derive(Debug)]
pub struct RecordingConnection {
    store: RecordingStore,
}

impl RecordingConnection {
    fn record(&self, sql: &str) -> Result<(), StoreError> {
        self.store
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_owned());
        match self
            .store
            .failures
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            Some((_, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl StoreConnection for RecordingConnection {
    fn execute(&mut self, sql: &str, _params: &Params) -> Result<u64, StoreError> {
        self.record(sql).map(|()| 1)
    }

    fn query(&mut self, sql: &str, _params: &Params) -> Result<QueryRows, StoreError> {
        self.record(sql)?;
        if sql.starts_with("INSERT") {
            return Ok(QueryRows {
                columns: vec!["gid".to_owned()],
                rows: vec![vec![StoreValue::Integer(41)]],
            });
        }
        Ok(self.store.rows.clone())
    }

    fn sequence_value(&mut self, sequence: &str) -> Result<StoreValue, StoreError> {
        self.record(&format!("CURRVAL {sequence}"))?;
        Ok(StoreValue::Integer(99))
    }

    fn column_type(
        &mut self,
        _schema: &str,
        _table: &str,
        column: &str,
    ) -> Result<Option<String>, StoreError> {
        self.record(&format!("COLUMN TYPE {column}"))?;
        Ok(self.store.column_type.clone())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.record("COMMIT")
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.record("ROLLBACK")
    }
}
