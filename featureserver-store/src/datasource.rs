//! The query translation engine.
//!
//! A [`DataSource`] pairs a layer configuration with a [`Store`]. Reads run
//! on a short-lived connection; writes run inside a [`Transaction`] that
//! rolls back on the first failing statement and on drop, so a connection
//! never outlives its logical transaction.

use featureserver_core::{
    Action, ActionKind, DataSourceConfig, Feature, FeatureId, OperationKind, OperationResult,
    TransactionResponse,
};
use log::{debug, error, warn};

use crate::{
    connection::{Params, QueryRows, Store, StoreConnection, StoreError},
    error::{DataSourceError, FILTER_LOCATOR},
    probe::{AttributeType, Extent, Probe},
    rows::{features_from_rows, normalise},
    sql::{self, Statement},
};

/// A configured layer backed by a store.
#[derive(Debug)]
pub struct DataSource<S> {
    config: DataSourceConfig,
    store: S,
}

impl<S: Store> DataSource<S> {
    /// Bind a configuration to a store.
    #[must_use]
    pub const fn new(config: DataSourceConfig, store: S) -> Self {
        Self { config, store }
    }

    /// The layer configuration.
    #[must_use]
    pub const fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Every column the layer exposes.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.config.columns()
    }

    /// Open a connection and start a transaction.
    ///
    /// # Errors
    /// Returns [`DataSourceError::ConnectionFailure`] when the store cannot
    /// be reached.
    pub fn begin(&self) -> Result<Transaction<'_, S::Connection>, DataSourceError> {
        let connection =
            self.store
                .connect()
                .map_err(|source| DataSourceError::ConnectionFailure {
                    layer: self.config.name.clone(),
                    source,
                })?;
        debug!("opened transaction on data source {}", self.config.name);
        Ok(Transaction {
            config: &self.config,
            connection: Some(connection),
        })
    }

    /// Read features on a dedicated connection.
    ///
    /// # Errors
    /// Returns [`DataSourceError::InvalidFilterValue`] when the store rejects
    /// a filtered select, [`DataSourceError::ConnectionFailure`] when it is
    /// unreachable and [`DataSourceError::Geometry`] for unreadable rows.
    pub fn select(&self, action: &Action) -> Result<Vec<Feature>, DataSourceError> {
        let mut transaction = self.begin()?;
        let features = transaction.select(action)?;
        transaction.rollback()?;
        Ok(features)
    }

    /// Apply a batch of write actions in one transaction.
    ///
    /// Each action runs under its own savepoint. A failing action is undone
    /// and reported with a non-empty handle (its own or `<kind>-<index>`);
    /// the others are committed together.
    ///
    /// # Errors
    /// Fails without committing anything when the store is unreachable, when
    /// the batch contains a select, or when savepoint handling itself fails.
    pub fn transact(&self, actions: &[Action]) -> Result<TransactionResponse, DataSourceError> {
        let mut transaction = self.begin()?;
        let mut response = TransactionResponse::default();
        for (index, action) in actions.iter().enumerate() {
            if let Some(result) = transaction.apply_isolated(index, action)? {
                response.push(result);
            }
        }
        transaction.commit()?;
        Ok(response)
    }

    /// Classify a column as integer or string from the store catalog.
    ///
    /// Any failure degrades to [`AttributeType::String`].
    #[must_use]
    pub fn attribute_type(&self, column: &str) -> Probe<AttributeType> {
        match self.lookup_column_type(column) {
            Ok(Some(type_name)) => Probe::Found(AttributeType::from_type_name(&type_name)),
            Ok(None) => {
                warn!(
                    "column {column:?} not found in catalog for data source {}",
                    self.config.name
                );
                Probe::Unknown(AttributeType::default())
            }
            Err(err) => {
                warn!("attribute type lookup for {column:?} failed: {err}");
                Probe::Unknown(AttributeType::default())
            }
        }
    }

    fn lookup_column_type(&self, column: &str) -> Result<Option<String>, DataSourceError> {
        let mut connection = self.read_connection()?;
        let type_name = connection
            .column_type(&self.config.schema, &self.config.layer, column)
            .map_err(|source| store_failure(&self.config, source));
        release(&self.config, connection);
        type_name
    }

    /// The bounding box of every stored geometry.
    ///
    /// Any failure, including an empty layer, degrades to
    /// [`Extent::default`].
    #[must_use]
    pub fn extent(&self) -> Probe<Extent> {
        match self.lookup_extent() {
            Ok(Some(extent)) => Probe::Found(extent),
            Ok(None) => {
                warn!("data source {} reported no extent", self.config.name);
                Probe::Unknown(Extent::default())
            }
            Err(err) => {
                warn!("extent lookup failed: {err}");
                Probe::Unknown(Extent::default())
            }
        }
    }

    fn lookup_extent(&self) -> Result<Option<Extent>, DataSourceError> {
        let mut connection = self.read_connection()?;
        let rows = run_query(&self.config, &mut connection, &sql::extent(&self.config));
        release(&self.config, connection);
        let extent = rows?
            .scalar()
            .map(|value| normalise(value, self.config.encoding))
            .and_then(|value| value.as_text().and_then(Extent::from_box_text));
        Ok(extent)
    }

    fn read_connection(&self) -> Result<S::Connection, DataSourceError> {
        self.store
            .connect()
            .map_err(|source| DataSourceError::ConnectionFailure {
                layer: self.config.name.clone(),
                source,
            })
    }
}

fn release<C: StoreConnection>(config: &DataSourceConfig, connection: C) {
    if let Err(err) = connection.rollback() {
        error!(
            "failed to release connection for data source {}: {err}",
            config.name
        );
    }
}

/// A unit of work on one connection.
///
/// Dropping an open transaction rolls it back.
#[derive(Debug)]
pub struct Transaction<'a, C: StoreConnection> {
    config: &'a DataSourceConfig,
    connection: Option<C>,
}

impl<C: StoreConnection> Transaction<'_, C> {
    /// Whether the transaction can still run statements.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Insert the action's feature, or run its filter statement.
    ///
    /// Returns `None` when the action carries neither.
    ///
    /// # Errors
    /// Rolls the transaction back and returns the store failure.
    pub fn insert(&mut self, action: &Action) -> Result<Option<OperationResult>, DataSourceError> {
        self.guarded(|config, connection| insert(config, connection, action))
    }

    /// Update the identified feature, or run the action's filter statement.
    ///
    /// # Errors
    /// Rolls the transaction back and returns the store failure, or
    /// [`DataSourceError::IncompleteOperation`] when a feature update has no
    /// identifier or nothing to assign.
    pub fn update(&mut self, action: &Action) -> Result<Option<OperationResult>, DataSourceError> {
        self.guarded(|config, connection| update(config, connection, action))
    }

    /// Delete by identifier, by filter statement or by the feature's
    /// attributes, in that order of preference.
    ///
    /// # Errors
    /// Rolls the transaction back and returns the store failure, or
    /// [`DataSourceError::IncompleteOperation`] when an attribute delete has
    /// no predicate.
    pub fn delete(&mut self, action: &Action) -> Result<Option<OperationResult>, DataSourceError> {
        self.guarded(|config, connection| delete(config, connection, action))
    }

    /// Dispatch a write action on its kind.
    ///
    /// # Errors
    /// As for the individual operations; selects are rejected with
    /// [`DataSourceError::SelectInTransaction`].
    pub fn apply(&mut self, action: &Action) -> Result<Option<OperationResult>, DataSourceError> {
        self.guarded(|config, connection| write(config, connection, action))
    }

    /// Read features, seeing this transaction's uncommitted writes.
    ///
    /// # Errors
    /// As for [`DataSource::select`]; the transaction is rolled back.
    pub fn select(&mut self, action: &Action) -> Result<Vec<Feature>, DataSourceError> {
        self.guarded(|config, connection| select(config, connection, action))
    }

    /// Commit when the data source is writable, otherwise roll back.
    ///
    /// # Errors
    /// Returns [`DataSourceError::TransactionClosed`] if already finished and
    /// [`DataSourceError::Store`] when the store refuses.
    pub fn commit(mut self) -> Result<(), DataSourceError> {
        let connection = self.take_connection()?;
        let outcome = if self.config.writable {
            debug!("committing transaction on data source {}", self.config.name);
            connection.commit()
        } else {
            debug!(
                "data source {} is read-only; rolling back instead of committing",
                self.config.name
            );
            connection.rollback()
        };
        outcome.map_err(|source| store_failure(self.config, source))
    }

    /// Roll back and release the connection.
    ///
    /// # Errors
    /// Returns [`DataSourceError::TransactionClosed`] if already finished and
    /// [`DataSourceError::Store`] when the rollback fails.
    pub fn rollback(mut self) -> Result<(), DataSourceError> {
        let connection = self.take_connection()?;
        debug!("rolling back transaction on data source {}", self.config.name);
        connection
            .rollback()
            .map_err(|source| store_failure(self.config, source))
    }

    fn take_connection(&mut self) -> Result<C, DataSourceError> {
        self.connection
            .take()
            .ok_or_else(|| DataSourceError::TransactionClosed {
                layer: self.config.name.clone(),
            })
    }

    fn guarded<T>(
        &mut self,
        operation: impl FnOnce(&DataSourceConfig, &mut C) -> Result<T, DataSourceError>,
    ) -> Result<T, DataSourceError> {
        let config = self.config;
        let connection =
            self.connection
                .as_mut()
                .ok_or_else(|| DataSourceError::TransactionClosed {
                    layer: config.name.clone(),
                })?;
        let outcome = operation(config, connection);
        if outcome.is_err() {
            self.abort();
        }
        outcome
    }

    fn apply_isolated(
        &mut self,
        index: usize,
        action: &Action,
    ) -> Result<Option<OperationResult>, DataSourceError> {
        let kind = operation_kind(self.config, action)?;
        let savepoint = format!("fs_action_{index}");
        self.guarded(|config, connection| {
            connection
                .savepoint(&savepoint)
                .map_err(|source| store_failure(config, source))?;
            match write(config, connection, action) {
                Ok(result) => {
                    connection
                        .release_savepoint(&savepoint)
                        .map_err(|source| store_failure(config, source))?;
                    Ok(result)
                }
                Err(err) => {
                    let handle = failure_handle(action, index);
                    warn!(
                        "{} {handle} on data source {} failed: {err}",
                        action.kind, config.name
                    );
                    connection
                        .rollback_to_savepoint(&savepoint)
                        .map_err(|source| store_failure(config, source))?;
                    Ok(Some(OperationResult::failed(
                        kind,
                        action.id.clone(),
                        handle,
                    )))
                }
            }
        })
    }

    fn abort(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!("rolling back transaction on data source {}", self.config.name);
            if let Err(err) = connection.rollback() {
                error!(
                    "rollback failed on data source {}: {err}",
                    self.config.name
                );
            }
        }
    }
}

impl<C: StoreConnection> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        self.abort();
    }
}

fn failure_handle(action: &Action, index: usize) -> String {
    action
        .handle
        .clone()
        .filter(|handle| !handle.is_empty())
        .unwrap_or_else(|| format!("{}-{index}", action.kind))
}

fn operation_kind(
    config: &DataSourceConfig,
    action: &Action,
) -> Result<OperationKind, DataSourceError> {
    match action.kind {
        ActionKind::Insert => Ok(OperationKind::Insert),
        ActionKind::Update => Ok(OperationKind::Update),
        ActionKind::Delete => Ok(OperationKind::Delete),
        ActionKind::Select => Err(DataSourceError::SelectInTransaction {
            layer: config.name.clone(),
        }),
    }
}

fn store_failure(config: &DataSourceConfig, source: StoreError) -> DataSourceError {
    DataSourceError::Store {
        layer: config.name.clone(),
        source,
    }
}

fn incomplete(config: &DataSourceConfig, kind: ActionKind, reason: &'static str) -> DataSourceError {
    DataSourceError::IncompleteOperation {
        layer: config.name.clone(),
        kind,
        reason,
    }
}

fn run_execute<C: StoreConnection>(
    config: &DataSourceConfig,
    connection: &mut C,
    statement: &Statement,
) -> Result<u64, DataSourceError> {
    debug!("{} -- {}", statement.sql, statement.params);
    connection
        .execute(&statement.sql, &statement.params)
        .map_err(|source| store_failure(config, source))
}

fn run_query<C: StoreConnection>(
    config: &DataSourceConfig,
    connection: &mut C,
    statement: &Statement,
) -> Result<QueryRows, DataSourceError> {
    debug!("{} -- {}", statement.sql, statement.params);
    connection
        .query(&statement.sql, &statement.params)
        .map_err(|source| store_failure(config, source))
}

fn filter_statement(config: &DataSourceConfig, action: &Action) -> Option<Statement> {
    action.filter.as_ref().map(|filter| Statement {
        sql: filter.statement(config),
        params: Params::new(),
    })
}

fn write<C: StoreConnection>(
    config: &DataSourceConfig,
    connection: &mut C,
    action: &Action,
) -> Result<Option<OperationResult>, DataSourceError> {
    match action.kind {
        ActionKind::Insert => insert(config, connection, action),
        ActionKind::Update => update(config, connection, action),
        ActionKind::Delete => delete(config, connection, action),
        ActionKind::Select => Err(DataSourceError::SelectInTransaction {
            layer: config.name.clone(),
        }),
    }
}

fn insert<C: StoreConnection>(
    config: &DataSourceConfig,
    connection: &mut C,
    action: &Action,
) -> Result<Option<OperationResult>, DataSourceError> {
    if let Some(feature) = &action.feature {
        let rows = run_query(config, connection, &sql::insert(config, feature))?;
        let id = rows
            .scalar()
            .and_then(|value| FeatureId::from_value(&normalise(value, config.encoding)));
        return Ok(Some(OperationResult::succeeded(OperationKind::Insert, id)));
    }
    if let Some(statement) = filter_statement(config, action) {
        run_execute(config, connection, &statement)?;
        let sequence = sql::id_sequence(config);
        debug!("reading current value of {sequence}");
        let value = connection
            .sequence_value(&sequence)
            .map_err(|source| store_failure(config, source))?;
        let id = FeatureId::from_value(&normalise(&value, config.encoding));
        return Ok(Some(OperationResult::succeeded(OperationKind::Insert, id)));
    }
    Ok(None)
}

fn update<C: StoreConnection>(
    config: &DataSourceConfig,
    connection: &mut C,
    action: &Action,
) -> Result<Option<OperationResult>, DataSourceError> {
    if let Some(feature) = &action.feature {
        let id = action
            .id
            .as_ref()
            .or(feature.id.as_ref())
            .ok_or_else(|| incomplete(config, ActionKind::Update, "no feature identifier"))?;
        let statement = sql::update(config, id, feature)
            .ok_or_else(|| incomplete(config, ActionKind::Update, "nothing to assign"))?;
        run_execute(config, connection, &statement)?;
        return Ok(Some(OperationResult::succeeded(
            OperationKind::Update,
            Some(id.clone()),
        )));
    }
    if let Some(statement) = filter_statement(config, action) {
        run_execute(config, connection, &statement)?;
        return Ok(Some(OperationResult::succeeded(
            OperationKind::Update,
            action.id.clone(),
        )));
    }
    Ok(None)
}

fn delete<C: StoreConnection>(
    config: &DataSourceConfig,
    connection: &mut C,
    action: &Action,
) -> Result<Option<OperationResult>, DataSourceError> {
    if let Some(id) = &action.id {
        run_execute(config, connection, &sql::delete_by_id(config, id))?;
        return Ok(Some(OperationResult::succeeded(
            OperationKind::Delete,
            Some(id.clone()),
        )));
    }
    if let Some(statement) = filter_statement(config, action) {
        run_execute(config, connection, &statement)?;
        return Ok(Some(OperationResult::succeeded(OperationKind::Delete, None)));
    }
    if let Some(feature) = &action.feature {
        let statement = sql::delete_matching(config, feature)
            .ok_or_else(|| incomplete(config, ActionKind::Delete, "no attributes to match"))?;
        run_execute(config, connection, &statement)?;
        return Ok(Some(OperationResult::succeeded(
            OperationKind::Delete,
            feature.id.clone(),
        )));
    }
    Ok(None)
}

fn select<C: StoreConnection>(
    config: &DataSourceConfig,
    connection: &mut C,
    action: &Action,
) -> Result<Vec<Feature>, DataSourceError> {
    if let Some(id) = &action.id {
        let rows = run_query(config, connection, &sql::select_by_id(config, id))?;
        return features_from_rows(config, &rows);
    }
    let statement = sql::select_matching(config, action);
    debug!("{} -- {}", statement.sql, statement.params);
    let rows = connection
        .query(&statement.sql, &statement.params)
        .map_err(|source| {
            if source.is_syntax_or_access_violation() {
                DataSourceError::InvalidFilterValue {
                    layer: config.name.clone(),
                    locator: FILTER_LOCATOR,
                    dump: source.message,
                }
            } else {
                store_failure(config, source)
            }
        })?;
    features_from_rows(config, &rows)
}
