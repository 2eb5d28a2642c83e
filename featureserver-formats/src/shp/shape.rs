//! Conversion of geometries into shapefile shapes.

use featureserver_core::{Geometry, GeometryKind};
use geo::{LineString, Orient, algorithm::orient::Direction};
use shapefile::{Point, Polygon, PolygonRing, Polyline};

use crate::CodecError;

const MIN_LINE_POINTS: usize = 2;
const MIN_RING_POINTS: usize = 4;

/// A shape type the encoder writes, built from one geometry.
pub(crate) trait FromGeometry: Sized {
    /// Geometry kind the shape type represents.
    const KIND: GeometryKind;

    /// Convert the geometry of feature `index`.
    fn from_geometry(index: usize, geometry: &Geometry) -> Result<Self, CodecError>;
}

fn points(line: &LineString<f64>) -> Vec<Point> {
    line.coords()
        .map(|coord| Point::new(coord.x, coord.y))
        .collect()
}

const fn mismatch(index: usize, expected: GeometryKind, geometry: &Geometry) -> CodecError {
    CodecError::MixedShapeKinds {
        index,
        expected,
        found: geometry.kind(),
    }
}

impl FromGeometry for Point {
    const KIND: GeometryKind = GeometryKind::Point;

    fn from_geometry(index: usize, geometry: &Geometry) -> Result<Self, CodecError> {
        match geometry {
            Geometry::Point(point) => Ok(Self::new(point.x(), point.y())),
            other => Err(mismatch(index, Self::KIND, other)),
        }
    }
}

impl FromGeometry for Polyline {
    const KIND: GeometryKind = GeometryKind::LineString;

    fn from_geometry(index: usize, geometry: &Geometry) -> Result<Self, CodecError> {
        let Geometry::LineString(line) = geometry else {
            return Err(mismatch(index, Self::KIND, geometry));
        };
        if line.0.len() < MIN_LINE_POINTS {
            return Err(CodecError::DegenerateShape {
                index,
                kind: Self::KIND,
            });
        }
        Ok(Self::new(points(line)))
    }
}

/// Polygon rings are handed over with the outer ring clockwise and holes
/// counter-clockwise.
impl FromGeometry for Polygon {
    const KIND: GeometryKind = GeometryKind::Polygon;

    fn from_geometry(index: usize, geometry: &Geometry) -> Result<Self, CodecError> {
        let Geometry::Polygon(polygon) = geometry else {
            return Err(mismatch(index, Self::KIND, geometry));
        };
        let oriented = polygon.orient(Direction::Reversed);
        let degenerate = std::iter::once(oriented.exterior())
            .chain(oriented.interiors())
            .any(|ring| ring.0.len() < MIN_RING_POINTS);
        if degenerate {
            return Err(CodecError::DegenerateShape {
                index,
                kind: Self::KIND,
            });
        }
        let rings = std::iter::once(PolygonRing::Outer(points(oriented.exterior())))
            .chain(
                oriented
                    .interiors()
                    .iter()
                    .map(|ring| PolygonRing::Inner(points(ring))),
            )
            .collect();
        Ok(Self::with_rings(rings))
    }
}
