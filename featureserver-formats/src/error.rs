//! Errors raised by the format codecs.

use std::io;

use camino::Utf8PathBuf;
use featureserver_core::{GeometryError, GeometryKind};
use thiserror::Error;

/// Failure to encode or decode a payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The JSON document could not be parsed.
    #[error("invalid JSON document")]
    Json(#[from] serde_json::Error),
    /// The XML document could not be parsed.
    #[error("invalid XML document")]
    Xml(#[from] quick_xml::Error),
    /// A geometry literal could not be parsed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// The document parsed but does not have the expected shape.
    #[error("invalid {format} document: {reason}")]
    InvalidDocument {
        /// Codec name.
        format: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// The codec cannot represent this geometry kind.
    #[error("{format} cannot represent {kind} geometries")]
    UnsupportedGeometry {
        /// Codec name.
        format: &'static str,
        /// Rejected kind.
        kind: GeometryKind,
    },
    /// A placemark carries no Point, LineString or Polygon.
    #[error("placemark {index} has no Point, LineString or Polygon")]
    MissingGeometry {
        /// Position of the placemark in the document.
        index: usize,
    },
    /// A feature handed to a shape writer has no geometry.
    #[error("feature {index} has no geometry")]
    FeatureWithoutGeometry {
        /// Position of the feature in the input.
        index: usize,
    },
    /// A coordinate tuple could not be read.
    #[error("invalid coordinates {text:?}")]
    InvalidCoordinates {
        /// Offending text.
        text: String,
    },
    /// Features of one shapefile use different geometry kinds.
    #[error("feature {index} is a {found} but the shapefile holds {expected} shapes")]
    MixedShapeKinds {
        /// Position of the offending feature.
        index: usize,
        /// Kind fixed by the first feature.
        expected: GeometryKind,
        /// Kind of the offending feature.
        found: GeometryKind,
    },
    /// A geometry has too few points to form its shape.
    #[error("feature {index} is a degenerate {kind}")]
    DegenerateShape {
        /// Position of the offending feature.
        index: usize,
        /// Kind of the geometry.
        kind: GeometryKind,
    },
    /// An attribute column name is not a valid dBASE field name.
    #[error("invalid attribute column name {name:?}")]
    InvalidFieldName {
        /// Rejected name.
        name: String,
    },
    /// The shapefile writer failed.
    #[error("failed to write feature {index} to the shapefile")]
    Shapefile {
        /// Position of the feature being written.
        index: usize,
        /// Underlying writer error.
        #[source]
        source: Box<shapefile::Error>,
    },
    /// The projection definition for a spatial reference could not be read.
    #[error("failed to read projection definition {path}")]
    Projection {
        /// Attempted location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl CodecError {
    /// Whether the error reports a geometry kind the codec cannot handle.
    #[must_use]
    pub const fn is_unsupported_geometry(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedGeometry { .. } | Self::Geometry(GeometryError::Unsupported { .. })
        )
    }
}
