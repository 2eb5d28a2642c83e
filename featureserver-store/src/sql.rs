//! SQL text generation for the data source operations.
//!
//! Every builder returns a [`Statement`]: PostGIS-dialect SQL with
//! `%(name)s` placeholders plus the [`Params`] that satisfy them. Values are
//! always bound; only identifiers, spatial reference ids and paging numbers
//! are interpolated.

use featureserver_core::{
    Action, BoundingBox, ComparisonOperator, DataSourceConfig, Feature, FeatureId, PropertyValue,
    Value, wkt::to_wkt,
};

use crate::connection::Params;

/// Alias of the projected WKT geometry column.
pub const GEOMETRY_ALIAS: &str = "fs_text_geom";

/// Parameter name bound to the target identifier.
pub const ID_PARAM: &str = "fs_fid";

/// Parameter name bound to a written or compared geometry.
pub const GEOMETRY_PARAM: &str = "fs_geom";

/// Alias of the projected version column.
pub const VERSION_ALIAS: &str = "version";

/// Alias of the projected elevation column.
pub const ELEVATION_ALIAS: &str = "ele";

const BBOX_PARAMS: [&str; 4] = ["fs_minx", "fs_miny", "fs_maxx", "fs_maxy"];

// Largest BIGINT; stands in for "no limit" when only an offset is given.
const UNBOUNDED_LIMIT: &str = "9223372036854775807";

/// SQL text and its bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL with `%(name)s` placeholders.
    pub sql: String,
    /// Values for the placeholders.
    pub params: Params,
}

/// Predicates or assignments derived from a feature's properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clauses {
    /// One SQL fragment per property, plus the geometry when present.
    pub clauses: Vec<String>,
    /// Values for the fragments' placeholders.
    pub params: Params,
}

/// Double-quote an identifier.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The placeholder for a named parameter.
#[must_use]
pub fn placeholder(name: &str) -> String {
    format!("%({name})s")
}

/// Parameter name bound to the `index`th property of a statement.
///
/// Property values never bind under their own keys, so a property cannot
/// collide with [`ID_PARAM`], [`GEOMETRY_PARAM`] or the bounding box.
#[must_use]
pub fn property_param(index: usize) -> String {
    format!("fs_p{index}")
}

/// Qualified name of the layer's identifier sequence.
#[must_use]
pub fn id_sequence(config: &DataSourceConfig) -> String {
    format!(
        "{}.{}",
        quote_identifier(&config.schema),
        quote_identifier(&config.id_sequence())
    )
}

fn geometry_expression(config: &DataSourceConfig, feature_srid: u32) -> String {
    format!(
        "ST_Transform(ST_SetSRID(ST_GeomFromText({}), {feature_srid}), {})",
        placeholder(GEOMETRY_PARAM),
        config.srid
    )
}

// Geometry written without an explicit SRID is taken to be in the layer's
// output projection, the one clients see.
fn feature_srid(config: &DataSourceConfig, feature: &Feature) -> u32 {
    feature.srid.unwrap_or(config.srid_out)
}

fn bind_geometry(feature: &Feature, params: &mut Params) -> bool {
    match &feature.geometry {
        Some(geometry) => {
            params.bind(GEOMETRY_PARAM, to_wkt(geometry));
            true
        }
        None => false,
    }
}

// The geometry column is only ever written from the feature's geometry.
fn attribute_properties<'a>(
    config: &'a DataSourceConfig,
    feature: &'a Feature,
) -> impl Iterator<Item = (usize, &'a String, &'a PropertyValue)> {
    feature
        .properties
        .iter()
        .filter(move |(key, _)| **key != config.geometry)
        .enumerate()
        .map(|(index, (key, value))| (index, key, value))
}

/// A `column <op> value` predicate.
///
/// `ilike` is spelled with `lower()` on both sides so the predicate runs on
/// backends without an `ILIKE` keyword.
#[must_use]
pub fn comparison_predicate(column: &str, operator: ComparisonOperator, param: &str) -> String {
    let quoted = quote_identifier(column);
    match operator {
        ComparisonOperator::ILike => {
            format!("lower({quoted}) LIKE lower({})", placeholder(param))
        }
        other => format!("{quoted} {} {}", other.sql(), placeholder(param)),
    }
}

/// One `column <op> %(fs_pN)s` fragment per property, plus a geometry
/// equality when the feature has a geometry.
///
/// Plain values compare with `=` against the column named by the key; a
/// [`PropertyValue::Comparison`] names its own column and operator.
/// Properties named after the geometry column are ignored.
#[must_use]
pub fn feature_predicates(config: &DataSourceConfig, feature: &Feature) -> Clauses {
    let mut clauses = Clauses::default();
    for (index, key, value) in attribute_properties(config, feature) {
        let param = property_param(index);
        let fragment = match value {
            PropertyValue::Scalar(_) => comparison_predicate(key, ComparisonOperator::Eq, &param),
            PropertyValue::Comparison(comparison) => {
                comparison_predicate(&comparison.column, comparison.operator, &param)
            }
        };
        clauses.clauses.push(fragment);
        clauses.params.bind(param, value.value().clone());
    }
    if bind_geometry(feature, &mut clauses.params) {
        clauses.clauses.push(format!(
            "{} = {}",
            quote_identifier(&config.geometry),
            geometry_expression(config, feature_srid(config, feature))
        ));
    }
    clauses
}

/// `column = %(fs_pN)s` assignments for an update.
///
/// A comparison property assigns to its column; the geometry is assigned
/// only when the feature carries one.
#[must_use]
pub fn feature_assignments(config: &DataSourceConfig, feature: &Feature) -> Clauses {
    let mut clauses = Clauses::default();
    for (index, key, value) in attribute_properties(config, feature) {
        let param = property_param(index);
        let column = match value {
            PropertyValue::Scalar(_) => key,
            PropertyValue::Comparison(comparison) => &comparison.column,
        };
        clauses
            .clauses
            .push(format!("{} = {}", quote_identifier(column), placeholder(&param)));
        clauses.params.bind(param, value.value().clone());
    }
    if bind_geometry(feature, &mut clauses.params) {
        clauses.clauses.push(format!(
            "{} = {}",
            quote_identifier(&config.geometry),
            geometry_expression(config, feature_srid(config, feature))
        ));
    }
    clauses
}

/// `INSERT ... RETURNING` the new identifier.
///
/// A missing geometry is written as `NULL`.
#[must_use]
pub fn insert(config: &DataSourceConfig, feature: &Feature) -> Statement {
    let mut params = Params::new();
    let mut columns = Vec::with_capacity(feature.properties.len() + 1);
    let mut values = Vec::with_capacity(feature.properties.len() + 1);
    for (index, key, value) in attribute_properties(config, feature) {
        let param = property_param(index);
        columns.push(quote_identifier(key));
        values.push(placeholder(&param));
        params.bind(param, value.value().clone());
    }
    columns.push(quote_identifier(&config.geometry));
    if bind_geometry(feature, &mut params) {
        values.push(geometry_expression(config, feature_srid(config, feature)));
    } else {
        params.bind(GEOMETRY_PARAM, Value::Null);
        values.push(placeholder(GEOMETRY_PARAM));
    }
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            config.qualified_table(),
            columns.join(", "),
            values.join(", "),
            quote_identifier(&config.fid)
        ),
        params,
    }
}

fn id_params(id: &FeatureId) -> Params {
    let mut params = Params::new();
    params.bind(ID_PARAM, id.to_value());
    params
}

fn id_predicate(config: &DataSourceConfig) -> String {
    format!("{} = {}", quote_identifier(&config.fid), placeholder(ID_PARAM))
}

/// `UPDATE ... SET ... WHERE fid = %(fs_fid)s`, or `None` when the feature
/// carries nothing to assign.
#[must_use]
pub fn update(config: &DataSourceConfig, id: &FeatureId, feature: &Feature) -> Option<Statement> {
    let assignments = feature_assignments(config, feature);
    if assignments.clauses.is_empty() {
        return None;
    }
    let mut params = id_params(id);
    params.extend(assignments.params);
    Some(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            config.qualified_table(),
            assignments.clauses.join(", "),
            id_predicate(config)
        ),
        params,
    })
}

/// `DELETE` of one feature by identifier.
#[must_use]
pub fn delete_by_id(config: &DataSourceConfig, id: &FeatureId) -> Statement {
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {}",
            config.qualified_table(),
            id_predicate(config)
        ),
        params: id_params(id),
    }
}

/// `DELETE` of every feature matching the feature's predicates, or `None`
/// when the feature yields no predicate.
#[must_use]
pub fn delete_matching(config: &DataSourceConfig, feature: &Feature) -> Option<Statement> {
    let predicates = feature_predicates(config, feature);
    if predicates.clauses.is_empty() {
        return None;
    }
    Some(Statement {
        sql: format!(
            "DELETE FROM {} WHERE {}",
            config.qualified_table(),
            predicates.clauses.join(" AND ")
        ),
        params: predicates.params,
    })
}

fn projection(config: &DataSourceConfig) -> Vec<String> {
    let mut columns = vec![format!(
        "ST_AsText(ST_Transform({}, {})) AS {GEOMETRY_ALIAS}",
        quote_identifier(&config.geometry),
        config.srid_out
    )];
    if let Some(version) = &config.version {
        columns.push(format!("{} AS {VERSION_ALIAS}", quote_identifier(version)));
    }
    if let Some(elevation) = &config.elevation {
        columns.push(format!("{} AS {ELEVATION_ALIAS}", quote_identifier(elevation)));
    }
    columns.push(quote_identifier(&config.fid));
    let attributes = config.attribute_cols.trim();
    if !attributes.is_empty() {
        columns.push(attributes.to_owned());
    }
    columns
}

/// Select one feature by identifier.
#[must_use]
pub fn select_by_id(config: &DataSourceConfig, id: &FeatureId) -> Statement {
    Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE {}",
            projection(config).join(", "),
            config.qualified_table(),
            id_predicate(config)
        ),
        params: id_params(id),
    }
}

fn bbox_predicate(config: &DataSourceConfig, bbox: &BoundingBox, params: &mut Params) -> String {
    let [min_x, min_y, max_x, max_y] = BBOX_PARAMS;
    params.bind(min_x, bbox.min_x);
    params.bind(min_y, bbox.min_y);
    params.bind(max_x, bbox.max_x);
    params.bind(max_y, bbox.max_y);
    format!(
        "ST_Intersects({}, ST_Transform(ST_MakeEnvelope({}, {}, {}, {}, {}), {}))",
        quote_identifier(&config.geometry),
        placeholder(min_x),
        placeholder(min_y),
        placeholder(max_x),
        placeholder(max_y),
        config.srid_out,
        config.srid
    )
}

/// Select features by attributes, bounding box and external filter, with
/// ordering and paging.
///
/// Attributes referenced by the filter but absent from the layer's columns
/// are added to the projection when `filter_attributes` is set.
#[must_use]
pub fn select_matching(config: &DataSourceConfig, action: &Action) -> Statement {
    let mut columns = projection(config);
    if let Some(filter) = action.filter.as_ref().filter(|_| config.filter_attributes) {
        let known = config.columns();
        for attribute in filter.attributes() {
            if !known.contains(&attribute) {
                columns.push(quote_identifier(&attribute));
            }
        }
    }
    columns.extend(config.additional_cols.iter().cloned());

    let mut params = Params::new();
    let mut predicates = Vec::new();
    if let Some(attributes) = &action.attributes {
        let feature = Feature {
            properties: attributes.clone(),
            ..Feature::default()
        };
        let clauses = feature_predicates(config, &feature);
        predicates.extend(clauses.clauses);
        params.extend(clauses.params);
    }
    if let Some(bbox) = &action.bbox {
        predicates.push(bbox_predicate(config, bbox, &mut params));
    }
    if let Some(filter) = &action.filter {
        let fragment = filter.render(config);
        if !fragment.trim().is_empty() {
            predicates.push(fragment);
        }
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        config.qualified_table()
    );
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    let order = config.order.trim();
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    match (action.max_features, action.start_feature) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
        (None, Some(offset)) => {
            sql.push_str(&format!(" LIMIT {UNBOUNDED_LIMIT} OFFSET {offset}"));
        }
        (None, None) => {}
    }
    Statement { sql, params }
}

/// The spatial extent of the layer's geometry column.
#[must_use]
pub fn extent(config: &DataSourceConfig) -> Statement {
    Statement {
        sql: format!(
            "SELECT ST_Extent({}) AS extent FROM {}",
            quote_identifier(&config.geometry),
            config.qualified_table()
        ),
        params: Params::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use featureserver_core::{Geometry, test_support::StaticFilter};
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> DataSourceConfig {
        DataSourceConfig::new("towns", "towns")
    }

    #[rstest]
    fn predicates_follow_property_shape(config: DataSourceConfig) {
        let feature = Feature::new()
            .with_property("name", "a")
            .with_property("pop", PropertyValue::comparison("pop", ComparisonOperator::Gt, 100));
        let predicates = feature_predicates(&config, &feature);
        assert_eq!(
            predicates.clauses,
            vec![r#""name" = %(fs_p0)s"#, r#""pop" > %(fs_p1)s"#]
        );
        assert_eq!(predicates.params.get("fs_p0"), Some(&Value::from("a")));
        assert_eq!(predicates.params.get("fs_p1"), Some(&Value::Integer(100)));
    }

    #[rstest]
    fn ilike_is_spelled_with_lower(config: DataSourceConfig) {
        let feature = Feature::new().with_property(
            "name",
            PropertyValue::comparison("name", ComparisonOperator::ILike, "harb%"),
        );
        let predicates = feature_predicates(&config, &feature);
        assert_eq!(
            predicates.clauses,
            vec![r#"lower("name") LIKE lower(%(fs_p0)s)"#]
        );
    }

    #[rstest]
    fn geometry_named_properties_are_ignored(config: DataSourceConfig) {
        let feature = Feature::new()
            .with_property("the_geom", "POINT(9 9)")
            .with_property("name", "a");
        let predicates = feature_predicates(&config, &feature);
        assert_eq!(predicates.clauses, vec![r#""name" = %(fs_p0)s"#]);
        let statement = insert(&config, &feature);
        assert!(statement.sql.contains(r#"("name", "the_geom")"#));
        assert_eq!(statement.params.get(GEOMETRY_PARAM), Some(&Value::Null));
    }

    #[rstest]
    fn geometry_predicate_is_transformed_to_native_srid(mut config: DataSourceConfig) {
        config.srid = 3857;
        let feature = Feature::new().with_geometry(Geometry::point(1.0, 2.0));
        let predicates = feature_predicates(&config, &feature);
        assert_eq!(
            predicates.clauses,
            vec![
                r#""the_geom" = ST_Transform(ST_SetSRID(ST_GeomFromText(%(fs_geom)s), 4326), 3857)"#
            ]
        );
        assert_eq!(
            predicates.params.get(GEOMETRY_PARAM),
            Some(&Value::from("POINT(1 2)"))
        );
    }

    #[rstest]
    fn insert_returns_identifier(config: DataSourceConfig) {
        let feature = Feature::new()
            .with_property("name", "a")
            .with_geometry(Geometry::point(1.0, 2.0))
            .with_srid(3857);
        let statement = insert(&config, &feature);
        assert_eq!(
            statement.sql,
            concat!(
                r#"INSERT INTO "public"."towns" ("name", "the_geom") VALUES (%(fs_p0)s, "#,
                r#"ST_Transform(ST_SetSRID(ST_GeomFromText(%(fs_geom)s), 3857), 4326)) "#,
                r#"RETURNING "gid""#
            )
        );
    }

    #[rstest]
    fn insert_without_geometry_binds_null(config: DataSourceConfig) {
        let statement = insert(&config, &Feature::new().with_property("name", "a"));
        assert!(statement.sql.contains("VALUES (%(fs_p0)s, %(fs_geom)s)"));
        assert_eq!(statement.params.get(GEOMETRY_PARAM), Some(&Value::Null));
    }

    #[rstest]
    fn update_targets_identifier(config: DataSourceConfig) {
        let statement = update(
            &config,
            &FeatureId::from(7),
            &Feature::new().with_property("name", "b"),
        )
        .expect("one assignment");
        assert_eq!(
            statement.sql,
            r#"UPDATE "public"."towns" SET "name" = %(fs_p0)s WHERE "gid" = %(fs_fid)s"#
        );
        assert_eq!(statement.params.get(ID_PARAM), Some(&Value::Integer(7)));
    }

    #[rstest]
    fn reserved_property_names_do_not_rebind_the_identifier(config: DataSourceConfig) {
        let feature = Feature::new()
            .with_property("name", "z")
            .with_property(ID_PARAM, 2_i64);
        let statement = update(&config, &FeatureId::from(1), &feature).expect("assignments");
        assert_eq!(
            statement.sql,
            concat!(
                r#"UPDATE "public"."towns" SET "fs_fid" = %(fs_p0)s, "name" = %(fs_p1)s "#,
                r#"WHERE "gid" = %(fs_fid)s"#
            )
        );
        assert_eq!(statement.params.get(ID_PARAM), Some(&Value::Integer(1)));
        assert_eq!(statement.params.get("fs_p0"), Some(&Value::Integer(2)));
    }

    #[rstest]
    fn update_without_assignments_is_skipped(config: DataSourceConfig) {
        assert!(update(&config, &FeatureId::from(7), &Feature::new()).is_none());
    }

    #[rstest]
    fn delete_matching_requires_a_predicate(config: DataSourceConfig) {
        assert!(delete_matching(&config, &Feature::new()).is_none());
        let statement = delete_matching(&config, &Feature::new().with_property("name", "a"))
            .expect("one predicate");
        assert_eq!(
            statement.sql,
            r#"DELETE FROM "public"."towns" WHERE "name" = %(fs_p0)s"#
        );
    }

    #[rstest]
    fn select_by_id_projects_text_geometry(mut config: DataSourceConfig) {
        config.srid_out = 3857;
        config.version = Some("rev".into());
        let statement = select_by_id(&config, &FeatureId::from(1));
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT ST_AsText(ST_Transform("the_geom", 3857)) AS fs_text_geom, "#,
                r#""rev" AS version, "gid", * FROM "public"."towns" WHERE "gid" = %(fs_fid)s"#
            )
        );
    }

    #[rstest]
    fn select_combines_filters_and_paging(mut config: DataSourceConfig) {
        config.order = "name".into();
        config.attribute_cols = "name, pop".into();
        let mut attributes = featureserver_core::Properties::new();
        attributes.insert("name".into(), "a".into());
        let filter = StaticFilter::where_fragment("pop > 10").with_attributes(["pop", "area"]);
        let action = Action::select()
            .with_attributes(attributes)
            .with_bbox(BoundingBox::new(0.0, 0.0, 1.0, 1.0))
            .with_filter(Arc::new(filter))
            .with_paging(Some(5), Some(10));
        let statement = select_matching(&config, &action);
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT ST_AsText(ST_Transform("the_geom", 4326)) AS fs_text_geom, "gid", "#,
                r#"name, pop, "area" FROM "public"."towns" WHERE "name" = %(fs_p0)s AND "#,
                r#"ST_Intersects("the_geom", ST_Transform(ST_MakeEnvelope(%(fs_minx)s, "#,
                r#"%(fs_miny)s, %(fs_maxx)s, %(fs_maxy)s, 4326), 4326)) AND pop > 10 "#,
                "ORDER BY name LIMIT 5 OFFSET 10"
            )
        );
        assert_eq!(statement.params.get("fs_maxx"), Some(&Value::Real(1.0)));
    }

    #[rstest]
    fn select_skips_filter_attributes_when_disabled(mut config: DataSourceConfig) {
        config.filter_attributes = false;
        config.additional_cols = vec!["area(the_geom) AS area".into()];
        let filter = StaticFilter::where_fragment("").with_attributes(["extra"]);
        let action = Action::select().with_filter(Arc::new(filter));
        let statement = select_matching(&config, &action);
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT ST_AsText(ST_Transform("the_geom", 4326)) AS fs_text_geom, "gid", "#,
                r#"*, area(the_geom) AS area FROM "public"."towns""#
            )
        );
    }

    #[rstest]
    fn offset_without_limit_is_unbounded(config: DataSourceConfig) {
        let action = Action::select().with_paging(None, Some(3));
        assert!(
            select_matching(&config, &action)
                .sql
                .ends_with(" LIMIT 9223372036854775807 OFFSET 3")
        );
    }

    #[rstest]
    fn sequence_name_is_schema_qualified(config: DataSourceConfig) {
        assert_eq!(id_sequence(&config), r#""public"."towns_gid_seq""#);
    }
}
