//! Requested operations against a data source.

use std::{fmt, str::FromStr, sync::Arc};

use thiserror::Error;

use crate::{
    config::DataSourceConfig,
    feature::{Feature, Properties},
    value::FeatureId,
};

/// Kind of operation an [`Action`] requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Read features.
    Select,
    /// Create a feature.
    Insert,
    /// Modify a feature.
    Update,
    /// Remove features.
    Delete,
}

impl ActionKind {
    /// Lower-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-parsed filter expression that renders itself as SQL.
///
/// Filter documents are parsed outside this workspace; the engine only needs
/// the SQL they produce and the attribute names they reference.
pub trait ExternalFilter: fmt::Debug + Send + Sync {
    /// A complete SQL statement for write actions (insert, update, delete).
    fn statement(&self, config: &DataSourceConfig) -> String;

    /// A `WHERE` fragment for select actions.
    fn render(&self, config: &DataSourceConfig) -> String;

    /// Column names the filter references.
    fn attributes(&self) -> Vec<String>;
}

/// Axis-aligned spatial filter expressed in the output spatial reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western edge.
    pub min_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// Eastern edge.
    pub max_x: f64,
    /// Northern edge.
    pub max_y: f64,
}

impl BoundingBox {
    /// Build a box from its four edges.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

/// Errors returned when parsing a [`BoundingBox`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundingBoxParseError {
    /// The text did not contain exactly four comma-separated values.
    #[error("bbox must have four comma-separated values, found {found}")]
    WrongArity {
        /// Number of values found.
        found: usize,
    },
    /// One of the values was not a number.
    #[error("bbox value {value:?} is not a number")]
    NotANumber {
        /// The offending value.
        value: String,
    },
}

impl FromStr for BoundingBox {
    type Err = BoundingBoxParseError;

    /// Parse `minx,miny,maxx,maxy`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let values = text
            .split(',')
            .map(|part| {
                let trimmed = part.trim();
                trimmed
                    .parse::<f64>()
                    .map_err(|_| BoundingBoxParseError::NotANumber {
                        value: trimmed.to_owned(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        match values.as_slice() {
            [min_x, min_y, max_x, max_y] => Ok(Self::new(*min_x, *min_y, *max_x, *max_y)),
            other => Err(BoundingBoxParseError::WrongArity { found: other.len() }),
        }
    }
}

/// One requested operation.
///
/// A select is driven by exactly one of `id`, `attributes`/`bbox` or
/// `filter`; writes use `feature` or `filter`.
#[derive(Debug, Clone)]
pub struct Action {
    /// Operation kind.
    pub kind: ActionKind,
    /// Target identifier for direct select, update and delete.
    pub id: Option<FeatureId>,
    /// Feature to write, or the predicate source for attribute deletes.
    pub feature: Option<Feature>,
    /// Attribute filter for selects.
    pub attributes: Option<Properties>,
    /// Spatial filter for selects.
    pub bbox: Option<BoundingBox>,
    /// Externally parsed filter.
    pub filter: Option<Arc<dyn ExternalFilter>>,
    /// Maximum number of features to return.
    pub max_features: Option<u64>,
    /// Number of features to skip.
    pub start_feature: Option<u64>,
    /// Caller-supplied correlation token reported back on failure.
    pub handle: Option<String>,
}

impl Action {
    /// An action of the given kind with no targets.
    #[must_use]
    pub const fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            id: None,
            feature: None,
            attributes: None,
            bbox: None,
            filter: None,
            max_features: None,
            start_feature: None,
            handle: None,
        }
    }

    /// A select over the whole layer, to be narrowed with the `with_*` builders.
    #[must_use]
    pub const fn select() -> Self {
        Self::new(ActionKind::Select)
    }

    /// A select of one feature by identifier.
    #[must_use]
    pub fn select_by_id(id: impl Into<FeatureId>) -> Self {
        Self::select().with_id(id)
    }

    /// Insert a feature.
    #[must_use]
    pub fn insert(feature: Feature) -> Self {
        Self::new(ActionKind::Insert).with_feature(feature)
    }

    /// Update the feature with the given identifier.
    #[must_use]
    pub fn update(id: impl Into<FeatureId>, feature: Feature) -> Self {
        Self::new(ActionKind::Update)
            .with_id(id)
            .with_feature(feature)
    }

    /// Delete the feature with the given identifier.
    #[must_use]
    pub fn delete(id: impl Into<FeatureId>) -> Self {
        Self::new(ActionKind::Delete).with_id(id)
    }

    /// Set the target identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the feature.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Set the attribute filter.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Properties) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Set the spatial filter.
    #[must_use]
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Attach an external filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn ExternalFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Limit and offset the result set.
    #[must_use]
    pub fn with_paging(mut self, max_features: Option<u64>, start_feature: Option<u64>) -> Self {
        self.max_features = max_features;
        self.start_feature = start_feature;
        self
    }

    /// Attach a correlation handle.
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}
