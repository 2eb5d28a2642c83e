//! Mapping of query rows into features.

use chrono::NaiveDate;
use featureserver_core::{
    DataSourceConfig, Feature, FeatureId, TextEncoding, Value, value::DATETIME_FORMAT,
    wkt::from_wkt,
};

use crate::{
    connection::{QueryRows, StoreValue},
    error::DataSourceError,
    sql::GEOMETRY_ALIAS,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Normalise a raw store value into a feature property value.
///
/// Byte strings are decoded with the layer encoding; dates, timestamps and
/// exact numerics become text.
pub(crate) fn normalise(value: &StoreValue, encoding: TextEncoding) -> Value {
    match value {
        StoreValue::Null => Value::Null,
        StoreValue::Bool(flag) => Value::Bool(*flag),
        StoreValue::Integer(number) => Value::Integer(*number),
        StoreValue::Real(number) => Value::Real(*number),
        StoreValue::Decimal(number) => Value::Text(number.to_string()),
        StoreValue::Text(text) => Value::Text(text.clone()),
        StoreValue::Bytes(bytes) => Value::Text(encoding.decode(bytes)),
        StoreValue::Date(date) => Value::Text(format_date(*date)),
        StoreValue::Timestamp(stamp) => Value::Text(stamp.format(DATETIME_FORMAT).to_string()),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Build features from rows projected with a `fs_text_geom` column.
///
/// Rows whose geometry is `NULL` are skipped. The identifier and raw
/// geometry columns are not repeated among the properties, and every
/// feature is tagged with the layer's output projection.
pub(crate) fn features_from_rows(
    config: &DataSourceConfig,
    rows: &QueryRows,
) -> Result<Vec<Feature>, DataSourceError> {
    let mut features = Vec::with_capacity(rows.rows.len());
    for record in rows.records() {
        let mut wkt = None;
        let mut feature = Feature::new().with_srid(config.srid_out);
        for (column, value) in record {
            if column == GEOMETRY_ALIAS {
                wkt = match normalise(value, config.encoding) {
                    Value::Text(text) => Some(text),
                    _ => None,
                };
            } else if column == config.fid {
                if feature.id.is_none() {
                    feature.id = FeatureId::from_value(&normalise(value, config.encoding));
                }
            } else if column != config.geometry {
                feature
                    .properties
                    .insert(column.to_owned(), normalise(value, config.encoding).into());
            }
        }
        let Some(text) = wkt else {
            continue;
        };
        let geometry = from_wkt(&text).map_err(|source| DataSourceError::Geometry {
            layer: config.name.clone(),
            source,
        })?;
        features.push(feature.with_geometry(geometry));
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use featureserver_core::Geometry;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn rows(values: Vec<Vec<StoreValue>>) -> QueryRows {
        QueryRows {
            columns: vec![
                GEOMETRY_ALIAS.into(),
                "gid".into(),
                "name".into(),
                "the_geom".into(),
            ],
            rows: values,
        }
    }

    #[rstest]
    fn maps_rows_to_features() {
        let mut config = DataSourceConfig::new("towns", "towns");
        config.srid_out = 3857;
        let features = features_from_rows(
            &config,
            &rows(vec![vec![
                StoreValue::Text("POINT(1 2)".into()),
                StoreValue::Integer(4),
                StoreValue::Bytes(b"caf\xc3\xa9".to_vec()),
                StoreValue::Text("SRID=4326;POINT(1 2)".into()),
            ]]),
        )
        .expect("readable rows");
        let [feature] = features.as_slice() else {
            panic!("expected one feature, got {features:?}");
        };
        assert_eq!(feature.id, Some(FeatureId::Integer(4)));
        assert_eq!(feature.geometry, Some(Geometry::point(1.0, 2.0)));
        assert_eq!(feature.srid, Some(3857));
        assert_eq!(feature.properties.len(), 1);
        assert_eq!(feature.scalar("name"), Some(&Value::from("café")));
    }

    #[rstest]
    fn skips_rows_without_geometry() {
        let config = DataSourceConfig::new("towns", "towns");
        let features = features_from_rows(
            &config,
            &rows(vec![vec![
                StoreValue::Null,
                StoreValue::Integer(1),
                StoreValue::Null,
                StoreValue::Null,
            ]]),
        )
        .expect("readable rows");
        assert!(features.is_empty());
    }

    #[rstest]
    fn reports_unreadable_geometry() {
        let config = DataSourceConfig::new("towns", "towns");
        let err = features_from_rows(
            &config,
            &rows(vec![vec![
                StoreValue::Text("POINT(".into()),
                StoreValue::Integer(1),
                StoreValue::Null,
                StoreValue::Null,
            ]]),
        )
        .expect_err("malformed geometry");
        assert!(matches!(err, DataSourceError::Geometry { .. }));
    }

    #[rstest]
    #[case(StoreValue::Decimal(Decimal::new(1250, 2)), Value::from("12.50"))]
    #[case(
        StoreValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date")),
        Value::from("2024-03-01")
    )]
    #[case(StoreValue::Bytes(b"caf\xe9".to_vec()), Value::from("café"))]
    fn stringifies_non_scalar_values(#[case] raw: StoreValue, #[case] expected: Value) {
        assert_eq!(normalise(&raw, TextEncoding::Latin1), expected);
    }
}
