//! The uniform geometry representation shared by every codec.
//!
//! [`Geometry`] is a closed set of the six simple-feature kinds the server
//! understands. Each variant wraps the matching `geo` type so callers can
//! use the `geo` algorithms directly.

use std::fmt;

use geo::{
    BoundingRect, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};
use thiserror::Error;

/// A geometry in one of the supported simple-feature kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A single position.
    Point(Point<f64>),
    /// An ordered sequence of positions.
    LineString(LineString<f64>),
    /// An outer ring followed by zero or more interior rings.
    Polygon(Polygon<f64>),
    /// A collection of points.
    MultiPoint(MultiPoint<f64>),
    /// A collection of line strings.
    MultiLineString(MultiLineString<f64>),
    /// A collection of polygons.
    MultiPolygon(MultiPolygon<f64>),
}

/// Discriminant of a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// See [`Geometry::Point`].
    Point,
    /// See [`Geometry::LineString`].
    LineString,
    /// See [`Geometry::Polygon`].
    Polygon,
    /// See [`Geometry::MultiPoint`].
    MultiPoint,
    /// See [`Geometry::MultiLineString`].
    MultiLineString,
    /// See [`Geometry::MultiPolygon`].
    MultiPolygon,
}

impl GeometryKind {
    /// The GeoJSON/WKT style name of the kind, e.g. `"LineString"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
        }
    }

    /// Parse a kind from its GeoJSON name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Point,
            Self::LineString,
            Self::Polygon,
            Self::MultiPoint,
            Self::MultiLineString,
            Self::MultiPolygon,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while parsing or converting geometries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The geometry text could not be parsed.
    #[error("malformed geometry {text:?}: {reason}")]
    Malformed {
        /// Offending input, truncated by callers if needed.
        text: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// The geometry kind is not supported by the requesting component.
    #[error("unsupported geometry type {kind}")]
    Unsupported {
        /// Name of the rejected kind.
        kind: String,
    },
}

impl GeometryError {
    /// Build an [`GeometryError::Unsupported`] for a known kind.
    #[must_use]
    pub fn unsupported(kind: GeometryKind) -> Self {
        Self::Unsupported {
            kind: kind.as_str().to_owned(),
        }
    }
}

impl Geometry {
    /// Construct a point geometry.
    #[must_use]
    pub fn point(x: f64, y: f64) -> Self {
        Self::Point(Point::new(x, y))
    }

    /// The kind of this geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::LineString(_) => GeometryKind::LineString,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Axis-aligned bounds, or `None` for empty geometries.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Point(point) => Some(point.bounding_rect()),
            Self::LineString(line) => line.bounding_rect(),
            Self::Polygon(polygon) => polygon.bounding_rect(),
            Self::MultiPoint(points) => points.bounding_rect(),
            Self::MultiLineString(lines) => lines.bounding_rect(),
            Self::MultiPolygon(polygons) => polygons.bounding_rect(),
        }
    }
}

impl From<Geometry> for geo::Geometry<f64> {
    fn from(geometry: Geometry) -> Self {
        match geometry {
            Geometry::Point(point) => Self::Point(point),
            Geometry::LineString(line) => Self::LineString(line),
            Geometry::Polygon(polygon) => Self::Polygon(polygon),
            Geometry::MultiPoint(points) => Self::MultiPoint(points),
            Geometry::MultiLineString(lines) => Self::MultiLineString(lines),
            Geometry::MultiPolygon(polygons) => Self::MultiPolygon(polygons),
        }
    }
}

impl TryFrom<geo::Geometry<f64>> for Geometry {
    type Error = GeometryError;

    fn try_from(geometry: geo::Geometry<f64>) -> Result<Self, Self::Error> {
        let unsupported = |kind: &str| GeometryError::Unsupported {
            kind: kind.to_owned(),
        };
        match geometry {
            geo::Geometry::Point(point) => Ok(Self::Point(point)),
            geo::Geometry::LineString(line) => Ok(Self::LineString(line)),
            geo::Geometry::Polygon(polygon) => Ok(Self::Polygon(polygon)),
            geo::Geometry::MultiPoint(points) => Ok(Self::MultiPoint(points)),
            geo::Geometry::MultiLineString(lines) => Ok(Self::MultiLineString(lines)),
            geo::Geometry::MultiPolygon(polygons) => Ok(Self::MultiPolygon(polygons)),
            geo::Geometry::GeometryCollection(_) => Err(unsupported("GeometryCollection")),
            geo::Geometry::Line(_) => Err(unsupported("Line")),
            geo::Geometry::Rect(_) => Err(unsupported("Rect")),
            geo::Geometry::Triangle(_) => Err(unsupported("Triangle")),
        }
    }
}

impl From<Point<f64>> for Geometry {
    fn from(point: Point<f64>) -> Self {
        Self::Point(point)
    }
}

impl From<LineString<f64>> for Geometry {
    fn from(line: LineString<f64>) -> Self {
        Self::LineString(line)
    }
}

impl From<Polygon<f64>> for Geometry {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::Polygon(polygon)
    }
}

impl From<MultiPolygon<f64>> for Geometry {
    fn from(polygons: MultiPolygon<f64>) -> Self {
        Self::MultiPolygon(polygons)
    }
}
