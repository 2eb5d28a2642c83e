//! Results of best-effort metadata lookups.

use std::fmt;

/// Outcome of a metadata probe.
///
/// Probes never fail: when the store cannot answer, the documented default is
/// returned as [`Probe::Unknown`] so callers can tell the difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Probe<T> {
    /// The store answered.
    Found(T),
    /// The store could not answer; the value is the default.
    Unknown(T),
}

impl<T> Probe<T> {
    /// The value, whether found or defaulted.
    #[must_use]
    pub const fn value(&self) -> &T {
        match self {
            Self::Found(value) | Self::Unknown(value) => value,
        }
    }

    /// Take the value, whether found or defaulted.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Found(value) | Self::Unknown(value) => value,
        }
    }

    /// Whether the store answered.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Coarse attribute type reported to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttributeType {
    /// Any integer column.
    Integer,
    /// Everything else.
    #[default]
    String,
}

impl AttributeType {
    /// Classify a catalog type name.
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        if name.trim().to_ascii_lowercase().starts_with("int") {
            Self::Integer
        } else {
            Self::String
        }
    }

    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::String => "string",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounding box of a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    /// Western edge.
    pub min_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// Eastern edge.
    pub max_x: f64,
    /// Northern edge.
    pub max_y: f64,
}

impl Default for Extent {
    fn default() -> Self {
        Self {
            min_x: -1.0,
            min_y: -1.0,
            max_x: -1.0,
            max_y: -1.0,
        }
    }
}

impl Extent {
    /// Parse the `BOX(minx miny,maxx maxy)` text form of a box aggregate.
    #[must_use]
    pub fn from_box_text(text: &str) -> Option<Self> {
        let body = text
            .trim()
            .strip_prefix("BOX(")
            .and_then(|rest| rest.strip_suffix(')'))?;
        let numbers = body
            .split([',', ' '])
            .filter(|part| !part.is_empty())
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        match numbers.as_slice() {
            [min_x, min_y, max_x, max_y] => Some(Self {
                min_x: *min_x,
                min_y: *min_y,
                max_x: *max_x,
                max_y: *max_y,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
