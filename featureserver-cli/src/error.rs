//! Error types emitted by the feature server CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use featureserver_core::{BoundingBoxParseError, ConfigError};
use featureserver_formats::CodecError;
use featureserver_store::DataSourceError;
use thiserror::Error;

/// Errors emitted by the feature server CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Reading the layer configuration file failed.
    #[error("failed to read layer configuration at {path:?}: {source}")]
    ReadLayerConfig {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The layer configuration file is not a valid data source definition.
    #[error("invalid layer configuration in {path:?}: {source}")]
    ParseLayerConfig {
        path: Utf8PathBuf,
        #[source]
        source: ConfigError,
    },
    /// The layer configuration names no database and none was given.
    #[error("layer {layer:?} has no dsn (set --{field} or add a dsn to the layer configuration)")]
    MissingDatabase { layer: String, field: &'static str },
    /// The bounding box option could not be parsed.
    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(#[from] BoundingBoxParseError),
    /// The data source rejected the request.
    #[error("data source request failed: {0}")]
    DataSource(#[from] DataSourceError),
    /// The selected features could not be encoded.
    #[error("failed to encode features: {0}")]
    Encode(#[from] CodecError),
    /// Serialising the GeoJSON document failed.
    #[error("failed to serialise GeoJSON output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing to the output stream failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
    /// The shapefile output directory could not be prepared.
    #[error("failed to prepare output directory {path:?}: {source}")]
    OutputDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Writing one of the shapefile members failed.
    #[error("failed to write {path:?}: {source}")]
    WriteShapefile {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
