//! Coordinate reprojection between the spatial references the SQLite
//! backend understands.

use std::f64::consts::PI;

use featureserver_core::{Geometry, GeometryError};
use geo::{Coord, MapCoords};
use thiserror::Error;

const WGS84: u32 = 4326;
const WEB_MERCATOR: [u32; 2] = [3857, 900_913];
const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Failure raised inside a registered spatial function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpatialFunctionError {
    /// Input geometry text could not be read.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// No transformation is known between the two references.
    #[error("no transformation from SRID {from} to SRID {to}")]
    UnsupportedTransform {
        /// Source reference.
        from: u32,
        /// Target reference.
        to: u32,
    },
    /// Two geometries compared in one operation use different references.
    #[error("operation on mixed SRID geometries ({left} and {right})")]
    MixedSrid {
        /// Reference of the first operand.
        left: u32,
        /// Reference of the second operand.
        right: u32,
    },
    /// An SRID argument was negative or too large.
    #[error("invalid SRID {srid}")]
    InvalidSrid {
        /// Rejected value.
        srid: i64,
    },
}

fn is_web_mercator(srid: u32) -> bool {
    WEB_MERCATOR.contains(&srid)
}

#[expect(
    clippy::float_arithmetic,
    reason = "spherical mercator forward projection"
)]
fn to_web_mercator(coord: Coord<f64>) -> Coord<f64> {
    let latitude = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Coord {
        x: EARTH_RADIUS * coord.x.to_radians(),
        y: EARTH_RADIUS * (PI / 4.0 + latitude / 2.0).tan().ln(),
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "spherical mercator inverse projection"
)]
fn from_web_mercator(coord: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (coord.x / EARTH_RADIUS).to_degrees(),
        y: (2.0 * (coord.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
    }
}

/// Reproject a geometry from one spatial reference to another.
///
/// Supports the identity and spherical Web Mercator (3857/900913) to and
/// from WGS84 (4326).
///
/// # Errors
/// Returns [`SpatialFunctionError::UnsupportedTransform`] for any other pair.
///
/// # Examples
/// ```
/// use featureserver_core::Geometry;
/// use featureserver_store::sqlite::reproject;
///
/// let point = Geometry::point(10.0, 20.0);
/// assert_eq!(reproject(point.clone(), 3857, 900_913)?, point);
/// if let Geometry::Point(east) = reproject(Geometry::point(180.0, 0.0), 4326, 3857)? {
///     assert!((east.x() - 20_037_508.342_789_244).abs() < 1e-6);
/// }
/// # Ok::<(), featureserver_store::sqlite::SpatialFunctionError>(())
/// ```
pub fn reproject(geometry: Geometry, from: u32, to: u32) -> Result<Geometry, SpatialFunctionError> {
    if from == to || (is_web_mercator(from) && is_web_mercator(to)) {
        return Ok(geometry);
    }
    let convert: fn(Coord<f64>) -> Coord<f64> = if from == WGS84 && is_web_mercator(to) {
        to_web_mercator
    } else if is_web_mercator(from) && to == WGS84 {
        from_web_mercator
    } else {
        return Err(SpatialFunctionError::UnsupportedTransform { from, to });
    };
    let projected = geo::Geometry::from(geometry).map_coords(convert);
    Ok(Geometry::try_from(projected)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn coords(geometry: &Geometry) -> (f64, f64) {
        match geometry {
            Geometry::Point(point) => (point.x(), point.y()),
            other => panic!("expected a point, got {other:?}"),
        }
    }

    #[rstest]
    #[expect(
        clippy::float_arithmetic,
        reason = "test compares projected coordinates within a tolerance"
    )]
    fn projects_to_web_mercator() {
        let projected = reproject(Geometry::point(180.0, 0.0), 4326, 3857).expect("known pair");
        let (x, y) = coords(&projected);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[rstest]
    #[case(3857)]
    #[case(900_913)]
    #[expect(
        clippy::float_arithmetic,
        reason = "test compares projected coordinates within a tolerance"
    )]
    fn round_trips_through_web_mercator(#[case] mercator: u32) {
        let original = Geometry::point(-3.2, 55.95);
        let there = reproject(original.clone(), 4326, mercator).expect("known pair");
        let back = reproject(there, mercator, 4326).expect("known pair");
        let (x, y) = coords(&back);
        assert!((x + 3.2).abs() < 1e-9);
        assert!((y - 55.95).abs() < 1e-9);
    }

    #[rstest]
    fn rejects_unknown_pairs() {
        let err = reproject(Geometry::point(0.0, 0.0), 4326, 27_700).expect_err("unknown pair");
        assert_eq!(
            err,
            SpatialFunctionError::UnsupportedTransform {
                from: 4326,
                to: 27_700
            }
        );
    }
}
