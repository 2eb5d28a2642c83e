//! Format codecs for feature server payloads.
//!
//! Each codec converts between [`Feature`] lists and one wire format:
//!
//! - [`WktDecoder`] reads a single WKT literal;
//! - [`GeoJson`] reads and writes feature collections, transaction summaries
//!   and exception reports;
//! - [`Kml`] reads and writes placemark documents;
//! - [`ShapefileEncoder`] writes the shape, index, attribute and projection
//!   buffers of a shapefile.
//!
//! Codecs never touch a store.

#![forbid(unsafe_code)]

pub mod error;
pub mod geojson;
pub mod kml;
pub mod shp;
pub mod wkt;

use featureserver_core::Feature;

pub use error::CodecError;
pub use geojson::GeoJson;
pub use kml::Kml;
pub use shp::{ProjectionLibrary, ShapefileBuffers, ShapefileEncoder};
pub use wkt::WktDecoder;

/// Turns a feature list into a payload.
pub trait Encoder {
    /// Encoded representation.
    type Output;

    /// Encode `features` in order.
    ///
    /// # Errors
    /// Returns a [`CodecError`] when a feature cannot be represented.
    fn encode(&self, features: &[Feature]) -> Result<Self::Output, CodecError>;
}

/// Turns a textual payload into features.
pub trait Decoder {
    /// Decode every feature in `input`.
    ///
    /// # Errors
    /// Returns a [`CodecError`] when the payload is malformed.
    fn decode(&self, input: &str) -> Result<Vec<Feature>, CodecError>;
}
