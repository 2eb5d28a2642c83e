//! Facade crate for the feature server.
//!
//! This crate re-exports the feature and action model and exposes the query
//! engine, the SQLite store and the format codecs behind feature flags.

#![forbid(unsafe_code)]

pub use featureserver_core::{
    Action, ActionKind, BoundingBox, Comparison, ComparisonOperator, DataSourceConfig,
    ExceptionDetails, ExternalFilter, Feature, FeatureId, Geometry, GeometryError, GeometryKind,
    OperationKind, OperationResult, PropertyValue, TransactionResponse, TransactionStatus,
    TransactionSummary, Value,
};

#[cfg(feature = "store")]
pub use featureserver_store::{DataSource, DataSourceError, Store, StoreConnection, StoreError};

#[cfg(feature = "store-sqlite")]
pub use featureserver_store::SqliteStore;

#[cfg(feature = "formats")]
pub use featureserver_formats::{
    CodecError, Decoder, Encoder, GeoJson, Kml, ShapefileEncoder, WktDecoder,
};
