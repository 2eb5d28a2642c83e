//! Errors raised by [`crate::DataSource`] operations.

use featureserver_core::{ActionKind, ExceptionDetails, GeometryError};
use thiserror::Error;

use crate::connection::StoreError;

/// Locator reported for filters the store rejected.
pub const FILTER_LOCATOR: &str = "PostGIS";

/// Failure of a data source operation.
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// The store could not be reached.
    #[error("failed to connect to data source {layer:?}: {source}")]
    ConnectionFailure {
        /// Data source name.
        layer: String,
        /// Backend failure.
        #[source]
        source: StoreError,
    },
    /// The store rejected the filter as malformed or unauthorised.
    #[error("invalid filter for data source {layer:?}: {dump}")]
    InvalidFilterValue {
        /// Data source name.
        layer: String,
        /// Component that rejected the filter.
        locator: &'static str,
        /// Store diagnostic.
        dump: String,
    },
    /// An action lacked what its kind requires.
    #[error("incomplete {kind} on data source {layer:?}: {reason}")]
    IncompleteOperation {
        /// Data source name.
        layer: String,
        /// Kind of the action.
        kind: ActionKind,
        /// What was missing.
        reason: &'static str,
    },
    /// Only writes may be batched in a transaction.
    #[error("select actions cannot run inside a transaction on data source {layer:?}")]
    SelectInTransaction {
        /// Data source name.
        layer: String,
    },
    /// Geometry returned by the store could not be decoded.
    #[error("data source {layer:?} returned an unreadable geometry: {source}")]
    Geometry {
        /// Data source name.
        layer: String,
        /// Decoding failure.
        #[source]
        source: GeometryError,
    },
    /// A statement failed.
    #[error("statement failed on data source {layer:?}: {source}")]
    Store {
        /// Data source name.
        layer: String,
        /// Backend failure.
        #[source]
        source: StoreError,
    },
    /// The transaction was already committed or rolled back.
    #[error("transaction on data source {layer:?} is closed")]
    TransactionClosed {
        /// Data source name.
        layer: String,
    },
}

impl DataSourceError {
    /// Name of the data source the error concerns.
    #[must_use]
    pub fn layer(&self) -> &str {
        match self {
            Self::ConnectionFailure { layer, .. }
            | Self::InvalidFilterValue { layer, .. }
            | Self::IncompleteOperation { layer, .. }
            | Self::SelectInTransaction { layer }
            | Self::Geometry { layer, .. }
            | Self::Store { layer, .. }
            | Self::TransactionClosed { layer } => layer,
        }
    }

    /// Backend diagnostic code, when the store supplied one.
    #[must_use]
    pub fn store_code(&self) -> Option<&str> {
        match self {
            Self::ConnectionFailure { source, .. } | Self::Store { source, .. } => {
                source.code.as_deref()
            }
            _ => None,
        }
    }

    /// The error in exception report form.
    #[must_use]
    pub fn details(&self) -> ExceptionDetails {
        let (code, locator, dump) = match self {
            Self::InvalidFilterValue { locator, dump, .. } => {
                ("InvalidParameterValue", *locator, dump.clone())
            }
            Self::IncompleteOperation { .. } | Self::SelectInTransaction { .. } => {
                ("MissingParameterValue", "DataSource", String::new())
            }
            Self::ConnectionFailure { source, .. } | Self::Store { source, .. } => {
                ("NoApplicableCode", "DataSource", source.message.clone())
            }
            Self::Geometry { source, .. } => ("NoApplicableCode", "DataSource", source.to_string()),
            Self::TransactionClosed { .. } => ("NoApplicableCode", "DataSource", String::new()),
        };
        ExceptionDetails {
            code: code.to_owned(),
            locator: locator.to_owned(),
            layer: self.layer().to_owned(),
            message: self.to_string(),
            dump,
        }
    }
}
