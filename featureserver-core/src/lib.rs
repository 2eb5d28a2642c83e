//! Core domain types for the feature server.
//!
//! This crate holds the values shared by the query translation engine and
//! the format codecs: [`Feature`] records, [`Action`] descriptors, the
//! [`DataSourceConfig`] describing a layer, transaction outcomes and the
//! WKT geometry codec. Nothing here touches a store or a wire format other
//! than WKT.

#![forbid(unsafe_code)]

pub mod action;
pub mod config;
pub mod exception;
pub mod feature;
pub mod geometry;
pub mod transaction;
pub mod value;
pub mod wkt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use action::{Action, ActionKind, BoundingBox, BoundingBoxParseError, ExternalFilter};
pub use config::{ConfigError, DataSourceConfig, TextEncoding};
pub use exception::ExceptionDetails;
pub use feature::{Comparison, ComparisonOperator, Feature, Properties, PropertyValue};
pub use geometry::{Geometry, GeometryError, GeometryKind};
pub use transaction::{
    OperationKind, OperationResult, TransactionResponse, TransactionStatus, TransactionSummary,
};
pub use value::{FeatureId, Value};
