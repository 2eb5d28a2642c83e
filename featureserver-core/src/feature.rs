//! Geographic features and their property maps.

use std::collections::BTreeMap;

use crate::{
    geometry::Geometry,
    value::{FeatureId, Value},
};

/// Ordered attribute map of a [`Feature`].
pub type Properties = BTreeMap<String, PropertyValue>;

/// Operators usable in a [`Comparison`] property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// Case-sensitive pattern match.
    Like,
    /// Case-insensitive pattern match.
    ILike,
    /// `=`
    Eq,
}

impl ComparisonOperator {
    /// The SQL spelling of the operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::Eq => "=",
        }
    }

    /// The short operator name used by request parameters.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::Eq => "eq",
        }
    }

    /// Parse the short operator name used by request parameters (`lt`, `gte`, ...).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lt" => Some(Self::Lt),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lte" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "ilike" => Some(Self::ILike),
            "eq" => Some(Self::Eq),
            _ => None,
        }
    }
}

/// A range or pattern filter carried in place of a plain property value.
///
/// `column` and `operator` shape the SQL predicate; `value` is what gets
/// bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Column the predicate applies to.
    pub column: String,
    /// Comparison operator.
    pub operator: ComparisonOperator,
    /// Bound operand.
    pub value: Value,
}

/// A property entry: either a plain scalar or a comparison predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Plain value; in filters this means equality.
    Scalar(Value),
    /// Structured predicate.
    Comparison(Comparison),
}

impl PropertyValue {
    /// Build a comparison predicate.
    pub fn comparison(
        column: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self::Comparison(Comparison {
            column: column.into(),
            operator,
            value: value.into(),
        })
    }

    /// The value that gets bound for this entry.
    #[must_use]
    pub const fn value(&self) -> &Value {
        match self {
            Self::Scalar(value) => value,
            Self::Comparison(comparison) => &comparison.value,
        }
    }
}

impl<T> From<T> for PropertyValue
where
    T: Into<Value>,
{
    fn from(value: T) -> Self {
        Self::Scalar(value.into())
    }
}

/// One geographic record.
///
/// # Examples
/// ```
/// use featureserver_core::{Feature, Geometry, Value};
///
/// let feature = Feature::new()
///     .with_geometry(Geometry::point(1.0, 2.0))
///     .with_property("name", "harbour");
/// assert_eq!(feature.scalar("name"), Some(&Value::from("harbour")));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    /// Store-assigned identifier; `None` before insertion.
    pub id: Option<FeatureId>,
    /// Geometry, when present.
    pub geometry: Option<Geometry>,
    /// Attribute values keyed by column name.
    pub properties: Properties,
    /// Spatial reference the geometry is expressed in, when known.
    pub srid: Option<u32>,
}

impl Feature {
    /// An empty feature.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Insert a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the spatial reference id.
    #[must_use]
    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = Some(srid);
        self
    }

    /// The value of a plain property; `None` when the key is absent or holds
    /// a comparison.
    #[must_use]
    pub fn scalar(&self, key: &str) -> Option<&Value> {
        match self.properties.get(key) {
            Some(PropertyValue::Scalar(value)) => Some(value),
            Some(PropertyValue::Comparison(_)) | None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("lt", "<")]
    #[case("gt", ">")]
    #[case("gte", ">=")]
    #[case("lte", "<=")]
    #[case("like", "like")]
    #[case("ilike", "ilike")]
    #[case("eq", "=")]
    fn operator_table_is_fixed(#[case] name: &str, #[case] sql: &str) {
        let operator = ComparisonOperator::from_name(name).expect("known operator");
        assert_eq!(operator.sql(), sql);
        assert_eq!(operator.name(), name);
    }

    #[rstest]
    fn unknown_operator_is_rejected() {
        assert_eq!(ComparisonOperator::from_name("between"), None);
    }

    #[rstest]
    fn comparison_binds_its_value() {
        let property = PropertyValue::comparison("pop", ComparisonOperator::Gt, 100);
        assert_eq!(property.value(), &Value::Integer(100));
    }

    #[rstest]
    fn scalar_ignores_comparisons() {
        let feature = Feature::new()
            .with_property("name", "harbour")
            .with_property("pop", PropertyValue::comparison("pop", ComparisonOperator::Gt, 100));
        assert_eq!(feature.scalar("name"), Some(&Value::from("harbour")));
        assert_eq!(feature.scalar("pop"), None);
        assert_eq!(feature.scalar("missing"), None);
    }
}
