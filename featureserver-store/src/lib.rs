//! Query translation engine for spatial data sources.
//!
//! [`DataSource`] turns [`featureserver_core::Action`] values into
//! PostGIS-dialect SQL, runs them through the [`Store`] seam under explicit
//! transactions and maps result rows back into features. The SQLite backend
//! in [`sqlite`] implements the seam with the spatial functions the
//! generated SQL needs.

#![forbid(unsafe_code)]

pub mod connection;
pub mod datasource;
pub mod error;
pub mod placeholder;
pub mod probe;
mod rows;
pub mod sql;

#[cfg(feature = "store-sqlite")]
pub mod sqlite;

#[cfg(test)]
mod test_support;

pub use connection::{Params, QueryRows, Store, StoreConnection, StoreError, StoreValue};
pub use datasource::{DataSource, Transaction};
pub use error::DataSourceError;
pub use probe::{AttributeType, Extent, Probe};
#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteConnection, SqliteStore};
