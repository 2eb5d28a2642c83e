//! Scalar attribute values and feature identifiers.

use std::fmt;

use chrono::NaiveDateTime;

/// Formatting used whenever a date/time value is rendered as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A scalar attribute value.
///
/// Values read back from a store are normalised so that only `Null`,
/// `Bool`, `Integer`, `Real` and `Text` appear; `DateTime` exists for
/// callers constructing features to write.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Timestamp without a zone.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Whether the value is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text content when the value is textual.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Integer(number) => write!(f, "{number}"),
            Self::Real(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
            Self::DateTime(stamp) => write!(f, "{}", stamp.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

/// Opaque feature identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureId {
    /// Numeric key, the common case for serial columns.
    Integer(i64),
    /// Textual key.
    Text(String),
}

impl FeatureId {
    /// The identifier as a bindable [`Value`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Integer(id) => Value::Integer(*id),
            Self::Text(id) => Value::Text(id.clone()),
        }
    }

    /// Build an identifier from a store value, if it has a usable shape.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(id) => Some(Self::Integer(*id)),
            Value::Text(id) => Some(Self::Text(id.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Null, "")]
    #[case(Value::Integer(42), "42")]
    #[case(Value::Real(1.5), "1.5")]
    #[case(Value::from("abc"), "abc")]
    #[case(Value::Bool(true), "true")]
    fn displays_scalars(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[rstest]
    fn displays_datetime_with_fixed_format() {
        let stamp = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(12, 30, 5))
            .expect("valid timestamp");
        assert_eq!(Value::DateTime(stamp).to_string(), "2024-03-01 12:30:05");
    }

    #[rstest]
    fn feature_id_round_trips_through_value() {
        let id = FeatureId::from(7);
        assert_eq!(FeatureId::from_value(&id.to_value()), Some(id));
        assert_eq!(FeatureId::from_value(&Value::Null), None);
    }
}
