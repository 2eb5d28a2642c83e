//! Well-Known-Text encoding and decoding for [`Geometry`].
//!
//! Output is deterministic: rings and coordinates are written in the order
//! they are stored, outer ring first.

use std::str::FromStr;

use ::wkt::{ToWkt, Wkt};

use crate::geometry::{Geometry, GeometryError};

/// Render a geometry as WKT.
///
/// # Examples
/// ```
/// use featureserver_core::{Geometry, wkt};
///
/// let text = wkt::to_wkt(&Geometry::point(1.0, 2.0));
/// assert!(text.starts_with("POINT"));
/// assert_eq!(wkt::from_wkt(&text), Ok(Geometry::point(1.0, 2.0)));
/// ```
#[must_use]
pub fn to_wkt(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Point(point) => point.wkt_string(),
        Geometry::LineString(line) => line.wkt_string(),
        Geometry::Polygon(polygon) => polygon.wkt_string(),
        Geometry::MultiPoint(points) => points.wkt_string(),
        Geometry::MultiLineString(lines) => lines.wkt_string(),
        Geometry::MultiPolygon(polygons) => polygons.wkt_string(),
    }
}

/// Parse WKT into a geometry.
///
/// # Errors
/// Returns [`GeometryError::Malformed`] when the text is not valid WKT and
/// [`GeometryError::Unsupported`] for collections.
pub fn from_wkt(text: &str) -> Result<Geometry, GeometryError> {
    let trimmed = text.trim();
    let parsed = Wkt::<f64>::from_str(trimmed).map_err(|reason| GeometryError::Malformed {
        text: trimmed.to_owned(),
        reason: reason.to_string(),
    })?;
    let geometry: geo::Geometry<f64> =
        parsed
            .try_into()
            .map_err(|err: ::wkt::conversion::Error| GeometryError::Malformed {
                text: trimmed.to_owned(),
                reason: format!("{err:?}"),
            })?;
    Geometry::try_from(geometry)
}
