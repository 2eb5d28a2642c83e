//! GeoJSON feature collections, transaction summaries and exception reports.

use featureserver_core::{
    Comparison, ComparisonOperator, ExceptionDetails, Feature, FeatureId, Geometry, GeometryError,
    GeometryKind, OperationKind, OperationResult, PropertyValue, TransactionResponse, Value,
    value::DATETIME_FORMAT,
};
use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{Map, Value as Json, json};

use crate::{CodecError, Decoder, Encoder};

const FORMAT: &str = "GeoJSON";

/// GeoJSON codec.
///
/// Encoding yields a `serde_json::Value`; serialise it with
/// `serde_json::to_string` when text is needed.
///
/// # Examples
/// ```
/// use featureserver_core::{Feature, Geometry};
/// use featureserver_formats::{Encoder, GeoJson};
///
/// let document = GeoJson::new().encode(&[Feature::new()
///     .with_id(7)
///     .with_geometry(Geometry::point(1.0, 2.0))])?;
/// assert_eq!(document["type"], "FeatureCollection");
/// assert_eq!(document["features"][0]["geometry"]["coordinates"][1], 2.0);
/// # Ok::<(), featureserver_formats::CodecError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoJson {
    crs: Option<u32>,
}

impl GeoJson {
    /// A codec that writes `"crs": null`.
    #[must_use]
    pub const fn new() -> Self {
        Self { crs: None }
    }

    /// Name the collection's coordinate reference as `EPSG:<srid>`.
    #[must_use]
    pub const fn with_crs(mut self, srid: u32) -> Self {
        self.crs = Some(srid);
        self
    }

    /// Encode one feature as a GeoJSON `Feature` object.
    #[must_use]
    pub fn encode_feature(&self, feature: &Feature) -> Json {
        let properties: Map<String, Json> = feature
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), property_to_json(value)))
            .collect();
        json!({
            "type": "Feature",
            "id": feature.id.as_ref().map_or(Json::Null, id_to_json),
            "geometry": feature.geometry.as_ref().map_or(Json::Null, geometry_to_json),
            "properties": properties,
        })
    }

    /// Encode a transaction outcome.
    ///
    /// Carries per-kind success totals, the handle and resource id of every
    /// result grouped by kind, and the overall status.
    #[must_use]
    pub fn encode_transaction(&self, response: &TransactionResponse) -> Json {
        let summary = response.summary();
        let results = |kind| -> Json {
            response
                .results_of(kind)
                .map(operation_to_json)
                .collect::<Vec<_>>()
                .into()
        };
        json!({
            "transactionSummary": {
                "totalInserted": summary.total_inserted,
                "totalUpdated": summary.total_updated,
                "totalDeleted": summary.total_deleted,
                "totalReplaced": summary.total_replaced,
            },
            "insertResults": results(OperationKind::Insert),
            "updateResults": results(OperationKind::Update),
            "replaceResults": results(OperationKind::Replace),
            "deleteResults": results(OperationKind::Delete),
            "status": summary.status.as_str(),
        })
    }

    /// Encode an exception report.
    #[must_use]
    pub fn encode_exception_report(&self, exceptions: &[ExceptionDetails]) -> Json {
        let entries: Vec<Json> = exceptions
            .iter()
            .map(|exception| {
                json!({
                    "Exception": {
                        "exceptionCode": exception.code,
                        "locator": exception.locator,
                        "layer": exception.layer,
                        "ExceptionText": exception.message,
                        "ExceptionDump": exception.dump,
                    }
                })
            })
            .collect();
        json!({ "ExceptionReport": entries })
    }
}

impl Encoder for GeoJson {
    type Output = Json;

    fn encode(&self, features: &[Feature]) -> Result<Json, CodecError> {
        let encoded: Vec<Json> = features
            .iter()
            .map(|feature| self.encode_feature(feature))
            .collect();
        let crs = self.crs.map_or(Json::Null, |srid| {
            json!({ "type": "name", "properties": { "name": format!("EPSG:{srid}") } })
        });
        Ok(json!({
            "type": "FeatureCollection",
            "features": encoded,
            "crs": crs,
        }))
    }
}

impl Decoder for GeoJson {
    /// Accepts a `FeatureCollection` (or a `members` list), a bare array of
    /// features, a single feature, or a bare geometry object.
    fn decode(&self, input: &str) -> Result<Vec<Feature>, CodecError> {
        let document: Json = serde_json::from_str(input)?;
        if let Json::Array(items) = &document {
            return items.iter().map(feature_from_json).collect();
        }
        let Json::Object(object) = &document else {
            return Err(invalid("top level is neither an object nor an array"));
        };
        if let Some(list) = object.get("features").or_else(|| object.get("members")) {
            let items = list
                .as_array()
                .ok_or_else(|| invalid("feature list is not an array"))?;
            return items.iter().map(feature_from_json).collect();
        }
        match object.get("type").and_then(Json::as_str) {
            None | Some("Feature") => Ok(vec![feature_from_json(&document)?]),
            Some(_) => Ok(vec![
                Feature::new().with_geometry(geometry_from_json(&document)?),
            ]),
        }
    }
}

fn invalid(reason: impl Into<String>) -> CodecError {
    CodecError::InvalidDocument {
        format: FORMAT,
        reason: reason.into(),
    }
}

fn id_to_json(id: &FeatureId) -> Json {
    match id {
        FeatureId::Integer(number) => json!(number),
        FeatureId::Text(text) => json!(text),
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(flag) => json!(flag),
        Value::Integer(number) => json!(number),
        Value::Real(number) => json!(number),
        Value::Text(text) => json!(text),
        Value::DateTime(stamp) => json!(stamp.format(DATETIME_FORMAT).to_string()),
    }
}

fn property_to_json(property: &PropertyValue) -> Json {
    match property {
        PropertyValue::Scalar(value) => value_to_json(value),
        PropertyValue::Comparison(comparison) => json!({
            "column": comparison.column,
            "operator": comparison.operator.name(),
            "value": value_to_json(&comparison.value),
        }),
    }
}

fn operation_to_json(result: &OperationResult) -> Json {
    json!({
        "handle": result.handle,
        "resourceId": result.resource_id.as_ref().map_or(Json::Null, id_to_json),
    })
}

fn position(coord: Coord<f64>) -> Json {
    json!([coord.x, coord.y])
}

fn line_to_json(line: &LineString<f64>) -> Json {
    line.coords().copied().map(position).collect::<Vec<_>>().into()
}

fn polygon_to_json(polygon: &Polygon<f64>) -> Json {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(line_to_json)
        .collect::<Vec<_>>()
        .into()
}

/// Render a geometry as a GeoJSON geometry object.
#[must_use]
pub fn geometry_to_json(geometry: &Geometry) -> Json {
    let coordinates: Json = match geometry {
        Geometry::Point(point) => position(point.0),
        Geometry::LineString(line) => line_to_json(line),
        Geometry::Polygon(polygon) => polygon_to_json(polygon),
        Geometry::MultiPoint(points) => points
            .iter()
            .map(|point| position(point.0))
            .collect::<Vec<_>>()
            .into(),
        Geometry::MultiLineString(lines) => lines.iter().map(line_to_json).collect::<Vec<_>>().into(),
        Geometry::MultiPolygon(polygons) => polygons
            .iter()
            .map(polygon_to_json)
            .collect::<Vec<_>>()
            .into(),
    };
    json!({ "type": geometry.kind().as_str(), "coordinates": coordinates })
}

fn array<'a>(value: &'a Json, what: &str) -> Result<&'a Vec<Json>, CodecError> {
    value
        .as_array()
        .ok_or_else(|| invalid(format!("{what} is not an array")))
}

fn parse_position(value: &Json) -> Result<Coord<f64>, CodecError> {
    let numbers = array(value, "position")?;
    let mut axes = numbers.iter().map(Json::as_f64);
    match (axes.next(), axes.next()) {
        (Some(Some(x)), Some(Some(y))) => Ok(Coord { x, y }),
        _ => Err(CodecError::InvalidCoordinates {
            text: value.to_string(),
        }),
    }
}

fn parse_line(value: &Json) -> Result<LineString<f64>, CodecError> {
    array(value, "line")?
        .iter()
        .map(parse_position)
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn parse_polygon(value: &Json) -> Result<Polygon<f64>, CodecError> {
    let mut rings = array(value, "polygon")?
        .iter()
        .map(parse_line)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| invalid("polygon has no exterior ring"))?;
    Ok(Polygon::new(exterior, rings.collect()))
}

fn each<T>(
    value: &Json,
    what: &str,
    parse: fn(&Json) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    array(value, what)?.iter().map(parse).collect()
}

/// Read a GeoJSON geometry object.
///
/// # Errors
/// Returns [`CodecError::InvalidDocument`] for structural problems and a
/// [`GeometryError::Unsupported`] for unknown geometry types.
pub fn geometry_from_json(value: &Json) -> Result<Geometry, CodecError> {
    let name = value
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid("geometry has no type"))?;
    let kind = GeometryKind::from_name(name).ok_or_else(|| GeometryError::Unsupported {
        kind: name.to_owned(),
    })?;
    let coordinates = value
        .get("coordinates")
        .ok_or_else(|| invalid(format!("{name} has no coordinates")))?;
    Ok(match kind {
        GeometryKind::Point => Geometry::Point(Point(parse_position(coordinates)?)),
        GeometryKind::LineString => Geometry::LineString(parse_line(coordinates)?),
        GeometryKind::Polygon => Geometry::Polygon(parse_polygon(coordinates)?),
        GeometryKind::MultiPoint => Geometry::MultiPoint(MultiPoint::new(
            each(coordinates, "multipoint", parse_position)?
                .into_iter()
                .map(Point)
                .collect(),
        )),
        GeometryKind::MultiLineString => Geometry::MultiLineString(MultiLineString::new(each(
            coordinates,
            "multilinestring",
            parse_line,
        )?)),
        GeometryKind::MultiPolygon => Geometry::MultiPolygon(MultiPolygon::new(each(
            coordinates,
            "multipolygon",
            parse_polygon,
        )?)),
    })
}

fn id_from_json(value: &Json) -> Option<FeatureId> {
    match value {
        Json::Number(number) => number.as_i64().map(FeatureId::Integer),
        Json::String(text) => Some(FeatureId::Text(text.clone())),
        _ => None,
    }
}

fn value_from_json(value: &Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(flag) => Value::Bool(*flag),
        Json::Number(number) => number.as_i64().map_or_else(
            || number.as_f64().map_or(Value::Null, Value::Real),
            Value::Integer,
        ),
        Json::String(text) => Value::Text(text.clone()),
        Json::Array(_) | Json::Object(_) => Value::Text(value.to_string()),
    }
}

/// An object with a known `operator` and a `value` becomes a comparison on
/// `column`, defaulting to the property key.
fn comparison_from_json(key: &str, object: &Map<String, Json>) -> Option<Comparison> {
    let operator = object
        .get("operator")
        .and_then(Json::as_str)
        .and_then(ComparisonOperator::from_name)?;
    let value = object.get("value")?;
    let column = object
        .get("column")
        .and_then(Json::as_str)
        .unwrap_or(key);
    Some(Comparison {
        column: column.to_owned(),
        operator,
        value: value_from_json(value),
    })
}

fn property_from_json(key: &str, value: &Json) -> PropertyValue {
    value
        .as_object()
        .and_then(|object| comparison_from_json(key, object))
        .map_or_else(
            || PropertyValue::Scalar(value_from_json(value)),
            PropertyValue::Comparison,
        )
}

fn feature_from_json(value: &Json) -> Result<Feature, CodecError> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("feature is not an object"))?;
    let mut feature = Feature::new();
    feature.id = object.get("id").and_then(id_from_json);
    feature.geometry = match object.get("geometry") {
        None | Some(Json::Null) => None,
        Some(geometry) => Some(geometry_from_json(geometry)?),
    };
    if let Some(properties) = object.get("properties").and_then(Json::as_object) {
        feature.properties = properties
            .iter()
            .map(|(key, raw)| (key.clone(), property_from_json(key, raw)))
            .collect();
    }
    Ok(feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use featureserver_core::wkt::from_wkt;
    use rstest::rstest;

    fn summary_of(handles: &[&str]) -> Json {
        let response: TransactionResponse = handles
            .iter()
            .enumerate()
            .map(|(index, handle)| {
                let kind = if index == 0 {
                    OperationKind::Update
                } else {
                    OperationKind::Insert
                };
                OperationResult::failed(kind, Some(FeatureId::Integer(10)), *handle)
            })
            .collect();
        GeoJson::new().encode_transaction(&response)
    }

    #[rstest]
    #[case(&["", "", "", ""], "SUCCESS")]
    #[case(&["", "h1", "", ""], "PARTIAL")]
    #[case(&["h0", "h1", "h2", "h3"], "FAILED")]
    fn reports_transaction_status(#[case] handles: &[&str], #[case] status: &str) {
        assert_eq!(summary_of(handles)["status"], status);
    }

    #[rstest]
    fn lists_results_per_kind() {
        let document = summary_of(&["", "bad", ""]);
        assert_eq!(document["transactionSummary"]["totalUpdated"], 1);
        assert_eq!(document["transactionSummary"]["totalInserted"], 1);
        assert_eq!(
            document["insertResults"],
            json!([
                { "handle": "bad", "resourceId": 10 },
                { "handle": "", "resourceId": 10 },
            ])
        );
        assert_eq!(document["deleteResults"], json!([]));
    }

    #[rstest]
    fn encodes_exception_reports() {
        let details = ExceptionDetails {
            code: "InvalidParameterValue".to_owned(),
            locator: "PostGIS".to_owned(),
            layer: "towns".to_owned(),
            message: "bad filter".to_owned(),
            dump: "syntax error".to_owned(),
        };
        assert_eq!(
            GeoJson::new().encode_exception_report(&[details]),
            json!({
                "ExceptionReport": [{
                    "Exception": {
                        "exceptionCode": "InvalidParameterValue",
                        "locator": "PostGIS",
                        "layer": "towns",
                        "ExceptionText": "bad filter",
                        "ExceptionDump": "syntax error",
                    }
                }]
            })
        );
    }

    #[rstest]
    fn encodes_collections_with_crs() {
        let feature = Feature::new()
            .with_id(3)
            .with_geometry(Geometry::point(1.5, 2.0))
            .with_property("name", "harbour")
            .with_property("pop", Value::Null);
        let document = GeoJson::new()
            .with_crs(4326)
            .encode(&[feature])
            .expect("encodable");
        assert_eq!(
            document,
            json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "id": 3,
                    "geometry": { "type": "Point", "coordinates": [1.5, 2.0] },
                    "properties": { "name": "harbour", "pop": null },
                }],
                "crs": { "type": "name", "properties": { "name": "EPSG:4326" } },
            })
        );
    }

    #[rstest]
    #[case(r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":null,"properties":{}}]}"#)]
    #[case(r#"{"members":[{"type":"Feature","geometry":null,"properties":{}}]}"#)]
    #[case(r#"[{"type":"Feature","geometry":null,"properties":{}}]"#)]
    #[case(r#"{"type":"Feature","geometry":null,"properties":{}}"#)]
    #[case(r#"{"type":"Point","coordinates":[1,2]}"#)]
    fn decodes_every_document_shape(#[case] input: &str) {
        let features = GeoJson::new().decode(input).expect("decodable");
        assert_eq!(features.len(), 1);
    }

    #[rstest]
    #[case("POLYGON((0 0,4 0,4 4,0 4,0 0),(1 1,2 1,2 2,1 1))")]
    #[case("MULTILINESTRING((0 0,1 1),(2 2,3 3))")]
    #[case("MULTIPOLYGON(((0 0,1 0,1 1,0 0)),((5 5,6 5,6 6,5 5)))")]
    fn geometries_survive_a_round_trip(#[case] wkt: &str) {
        let geometry = from_wkt(wkt).expect("valid literal");
        assert_eq!(
            geometry_from_json(&geometry_to_json(&geometry)).expect("decodable"),
            geometry
        );
    }

    #[rstest]
    fn multipoints_survive_a_round_trip() {
        let geometry = Geometry::MultiPoint(MultiPoint::from(vec![
            Point::new(1.0, 2.0),
            Point::new(3.0, 4.0),
        ]));
        assert_eq!(
            geometry_from_json(&geometry_to_json(&geometry)).expect("decodable"),
            geometry
        );
    }

    #[rstest]
    fn decodes_ids_and_comparisons() {
        let features = GeoJson::new()
            .decode(
                r#"{"type":"Feature","id":"a-1","geometry":null,
                   "properties":{"name":"x","pop":{"operator":"gt","value":100},"tags":[1]}}"#,
            )
            .expect("decodable");
        let [feature] = features.as_slice() else {
            panic!("expected one feature, got {features:?}");
        };
        assert_eq!(feature.id, Some(FeatureId::from("a-1")));
        assert_eq!(
            feature.properties.get("pop"),
            Some(&PropertyValue::comparison("pop", ComparisonOperator::Gt, 100))
        );
        assert_eq!(feature.scalar("tags"), Some(&Value::from("[1]")));
    }

    #[rstest]
    #[case(r#"{"type":"GeometryCollection","coordinates":[]}"#)]
    #[case(r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1]}}"#)]
    #[case("not json")]
    fn rejects_unusable_documents(#[case] input: &str) {
        assert!(GeoJson::new().decode(input).is_err());
    }
}
