//! Reading SQLite cells into [`StoreValue`]s.
//!
//! SQLite stores every value in one of five storage classes, so booleans,
//! exact numerics, dates and timestamps are recovered from the column's
//! declared type.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use rust_decimal::Decimal;

use crate::connection::StoreValue;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// What a column's declared type asks cells to be read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Declared {
    Boolean,
    Decimal,
    Date,
    Timestamp,
    Other,
}

impl Declared {
    /// Classify a declared type name such as `NUMERIC(10,2)` or `DATETIME`.
    pub(crate) fn from_decl_type(decl_type: Option<&str>) -> Self {
        let Some(name) = decl_type.map(str::to_ascii_uppercase) else {
            return Self::Other;
        };
        if name.contains("BOOL") {
            Self::Boolean
        } else if ["DECIMAL", "NUMERIC", "MONEY"]
            .iter()
            .any(|marker| name.contains(marker))
        {
            Self::Decimal
        } else if name.contains("TIMESTAMP") || name.contains("DATETIME") {
            Self::Timestamp
        } else if name.contains("DATE") {
            Self::Date
        } else {
            Self::Other
        }
    }
}

fn plain(value: ValueRef<'_>) -> StoreValue {
    match value {
        ValueRef::Null => StoreValue::Null,
        ValueRef::Integer(number) => StoreValue::Integer(number),
        ValueRef::Real(number) => StoreValue::Real(number),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => StoreValue::Text(text.to_owned()),
            Err(_) => StoreValue::Bytes(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => StoreValue::Bytes(bytes.to_vec()),
    }
}

fn timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Read one cell, honouring the column's declared type.
///
/// Cells that do not parse as their declared type are read as stored.
pub(crate) fn store_value(declared: Declared, value: ValueRef<'_>) -> StoreValue {
    let typed = match (declared, value) {
        (Declared::Boolean, ValueRef::Integer(number)) => Some(StoreValue::Bool(number != 0)),
        (Declared::Decimal, ValueRef::Integer(number)) => {
            Some(StoreValue::Decimal(Decimal::from(number)))
        }
        (Declared::Decimal, ValueRef::Real(number)) => {
            Decimal::try_from(number).ok().map(StoreValue::Decimal)
        }
        (Declared::Decimal, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| Decimal::from_str(text.trim()).ok())
            .map(StoreValue::Decimal),
        (Declared::Date, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok())
            .map(StoreValue::Date),
        (Declared::Timestamp, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| timestamp(text.trim()))
            .map(StoreValue::Timestamp),
        _ => None,
    };
    typed.unwrap_or_else(|| plain(value))
}
