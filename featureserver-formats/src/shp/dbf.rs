//! dBASE attribute table.
//!
//! Every column is a 50 byte character field. Columns are taken from the
//! first feature's property names; later features contribute values for
//! those columns only.

use std::collections::BTreeSet;

use featureserver_core::Feature;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};

use crate::CodecError;

const FIELD_LENGTH: u8 = 50;
const NAME_LENGTH: usize = 10;

/// A column of the attribute table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    /// Property the column is filled from.
    property: String,
    /// Name stored in the table header.
    name: String,
}

fn sanitise(property: &str) -> String {
    let cleaned: String = property
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .take(NAME_LENGTH)
        .collect();
    if cleaned.is_empty() {
        String::from("FIELD")
    } else {
        cleaned
    }
}

/// Longest prefix of `text` that fits in `width` bytes without splitting a
/// character.
fn fixed_width(text: &str, width: usize) -> String {
    let mut used = 0_usize;
    text.chars()
        .take_while(|ch| {
            used += ch.len_utf8();
            used <= width
        })
        .collect()
}

/// Column layout shared by every record of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Table {
    fields: Vec<Field>,
}

impl Table {
    /// Columns for `features`, with unique names of at most ten characters.
    pub(crate) fn for_features(features: &[Feature]) -> Self {
        let Some(first) = features.first() else {
            return Self::default();
        };
        let mut taken = BTreeSet::new();
        let fields = first
            .properties
            .keys()
            .map(|property| {
                let base = sanitise(property);
                let mut name = base.clone();
                let mut suffix = 1_usize;
                while taken.contains(&name) {
                    let tail = suffix.to_string();
                    let keep = NAME_LENGTH.saturating_sub(tail.len());
                    name = base.chars().take(keep).chain(tail.chars()).collect();
                    suffix += 1;
                }
                taken.insert(name.clone());
                Field {
                    property: property.clone(),
                    name,
                }
            })
            .collect();
        Self { fields }
    }

    /// Table writer builder declaring every column.
    pub(crate) fn builder(&self) -> Result<TableWriterBuilder, CodecError> {
        self.fields
            .iter()
            .try_fold(TableWriterBuilder::new(), |builder, field| {
                let name = FieldName::try_from(field.name.as_str()).map_err(|_| {
                    CodecError::InvalidFieldName {
                        name: field.name.clone(),
                    }
                })?;
                Ok(builder.add_character_field(name, FIELD_LENGTH))
            })
    }

    /// The row for `feature`; absent and null properties are written blank.
    pub(crate) fn record(&self, feature: &Feature) -> Record {
        let mut record = Record::default();
        for field in &self.fields {
            let text = feature
                .properties
                .get(&field.property)
                .map(featureserver_core::PropertyValue::value)
                .filter(|value| !value.is_null())
                .map(|value| fixed_width(&value.to_string(), usize::from(FIELD_LENGTH)));
            record.insert(field.name.clone(), FieldValue::Character(text));
        }
        record
    }

    #[cfg(test)]
    fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featureserver_core::Value;
    use rstest::rstest;

    #[rstest]
    #[case("name", "name")]
    #[case("population_total", "population")]
    #[case("área", "_rea")]
    #[case("", "FIELD")]
    fn sanitises_column_names(#[case] property: &str, #[case] expected: &str) {
        assert_eq!(sanitise(property), expected);
    }

    #[rstest]
    fn disambiguates_truncated_names() {
        let feature = Feature::new()
            .with_property("population_2020", 1_i64)
            .with_property("population_2021", 2_i64);
        assert_eq!(
            Table::for_features(&[feature]).names(),
            ["population", "populatio1"]
        );
    }

    #[rstest]
    fn records_hold_text_cells() {
        let features = vec![
            Feature::new()
                .with_property("name", "Leith")
                .with_property("rank", 3_i64),
            Feature::new().with_property("name", Value::Null),
        ];
        let table = Table::for_features(&features);
        let [leith, unnamed] = features.as_slice() else {
            panic!("two features");
        };
        let first = table.record(leith);
        assert_eq!(
            first.get("name"),
            Some(&FieldValue::Character(Some("Leith".to_owned())))
        );
        assert_eq!(
            first.get("rank"),
            Some(&FieldValue::Character(Some("3".to_owned())))
        );
        let second = table.record(unnamed);
        assert_eq!(second.get("name"), Some(&FieldValue::Character(None)));
        assert_eq!(second.get("rank"), Some(&FieldValue::Character(None)));
    }

    #[rstest]
    fn truncates_on_character_boundaries() {
        let text = "é".repeat(30);
        let cell = fixed_width(&text, usize::from(FIELD_LENGTH));
        assert_eq!(cell.len(), 50);
        assert_eq!(cell.chars().count(), 25);
    }
}
