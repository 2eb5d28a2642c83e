//! KML placemark documents.
//!
//! Each feature becomes a `Placemark` with a title, a description, a style
//! reference, an optional edit link, its attributes in the `fs` namespace
//! and a Point, LineString or Polygon. Decoding reverses this, reading
//! placemarks last to first.

use featureserver_core::{Feature, FeatureId, Geometry, Value};
use geo::{Coord, LineString, Point, Polygon};
use log::debug;
use quick_xml::{
    Reader,
    escape::escape,
    events::{BytesStart, Event},
};

use crate::{CodecError, Decoder, Encoder};

const FORMAT: &str = "KML";

/// Namespace of the document elements.
pub const KML_NAMESPACE: &str = "http://earth.google.com/kml/2.0";
/// Namespace of the attribute elements.
pub const FEATURE_NAMESPACE: &str = "http://featureserver.com/ns";
const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

/// Leading text of a generated description.
pub const DESCRIPTION_MARKER: &str = "Properties:";
const DEFAULT_STYLE: &str = "#allstyle";
const RESERVED: [&str; 3] = ["title", "description", "styleUrl"];
const STRUCTURAL: [&str; 7] = [
    "Point",
    "LineString",
    "Polygon",
    "MultiGeometry",
    "name",
    "Metadata",
    "link",
];

/// KML codec for one layer.
///
/// # Examples
/// ```
/// use featureserver_core::{Feature, Geometry};
/// use featureserver_formats::{Decoder, Encoder, Kml};
///
/// let kml = Kml::new("towns").with_base_url("http://example.com/featureserver");
/// let document = kml.encode(&[Feature::new()
///     .with_id(4)
///     .with_property("title", "Harbour")
///     .with_geometry(Geometry::point(1.0, 2.0))])?;
/// assert!(document.contains("<coordinates>1,2</coordinates>"));
/// assert!(document.contains(r#"href="http://example.com/featureserver/towns/4.kml""#));
///
/// let decoded = kml.decode(&document)?;
/// assert_eq!(decoded.first().and_then(|f| f.geometry.clone()), Some(Geometry::point(1.0, 2.0)));
/// # Ok::<(), featureserver_formats::CodecError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kml {
    base_url: Option<String>,
    layer: String,
    title_property: Option<String>,
}

impl Kml {
    /// A codec for `layer` without links.
    #[must_use]
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            base_url: None,
            layer: layer.into(),
            title_property: None,
        }
    }

    /// Emit self and edit links under `base_url`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Take placemark titles from `property` before falling back to `title`.
    #[must_use]
    pub fn with_title_property(mut self, property: impl Into<String>) -> Self {
        self.title_property = Some(property.into());
        self
    }

    fn title(&self, feature: &Feature) -> String {
        self.title_property
            .as_deref()
            .and_then(|key| feature.scalar(key))
            .or_else(|| feature.scalar("title"))
            .map(Value::to_string)
            .unwrap_or_default()
    }

    /// Render one feature as a `Placemark` element.
    ///
    /// Returns `None` for a feature without geometry, which no placemark can
    /// represent.
    ///
    /// # Errors
    /// Returns [`CodecError::UnsupportedGeometry`] for geometries other than
    /// Point, LineString and Polygon.
    pub fn encode_feature(&self, feature: &Feature) -> Result<Option<String>, CodecError> {
        let Some(geometry) = feature.geometry.as_ref().map(geometry_to_place).transpose()? else {
            return Ok(None);
        };
        let id = feature.id.as_ref().map(FeatureId::to_string);
        let mut placemark = String::from("<Placemark");
        if let Some(id) = &id {
            placemark.push_str(&format!(r#" id="{}""#, escape(id.as_str())));
        }
        placemark.push_str(&format!(
            "><name>{}</name><description>{}</description><styleUrl>{}</styleUrl>",
            escape(self.title(feature).as_str()),
            cdata(&description(feature)),
            escape(
                feature
                    .scalar("styleUrl")
                    .map_or_else(|| DEFAULT_STYLE.to_owned(), Value::to_string)
                    .as_str()
            ),
        ));
        if let Some(base_url) = &self.base_url {
            placemark.push_str(&format!(
                r#"<atom:link href="{}" type="edit" />"#,
                escape(
                    format!(
                        "{base_url}/{}/{}.kml",
                        self.layer,
                        id.as_deref().unwrap_or_default()
                    )
                    .as_str()
                )
            ));
        }
        placemark.push_str("<Metadata>");
        for (key, value) in &feature.properties {
            if RESERVED.contains(&key.as_str()) {
                continue;
            }
            let name = element_name(key);
            placemark.push_str(&format!(
                "<fs:{name}>{}</fs:{name}>",
                escape(value.value().to_string().as_str())
            ));
        }
        placemark.push_str("</Metadata>");
        placemark.push_str(&geometry);
        placemark.push_str("</Placemark>");
        Ok(Some(placemark))
    }
}

impl Encoder for Kml {
    type Output = String;

    fn encode(&self, features: &[Feature]) -> Result<String, CodecError> {
        let mut document = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                "\n",
                r#"<kml xmlns="{}" xmlns:fs="{}" xmlns:atom="{}">"#,
                "\n<Document>\n",
            ),
            KML_NAMESPACE, FEATURE_NAMESPACE, ATOM_NAMESPACE
        );
        if let Some(base_url) = &self.base_url {
            let href = format!("{base_url}/{layer}/{layer}-data.kml", layer = self.layer);
            document.push_str(&format!(
                "<atom:link rel=\"self\" href=\"{}\" type=\"application/vnd.google-earth.kml+xml\" />\n",
                escape(href.as_str())
            ));
        }
        document.push_str(concat!(
            r#"<Style id="allstyle">"#,
            "<LineStyle><width>5</width><color>ff0099ee</color></LineStyle>",
            "<PolyStyle><color>900099ee</color></PolyStyle>",
            "</Style>\n",
        ));
        for feature in features {
            let Some(placemark) = self.encode_feature(feature)? else {
                debug!("skipping feature {:?} without geometry", feature.id);
                continue;
            };
            document.push_str(&placemark);
            document.push('\n');
        }
        document.push_str("</Document>\n</kml>");
        Ok(document)
    }
}

impl Decoder for Kml {
    fn decode(&self, input: &str) -> Result<Vec<Feature>, CodecError> {
        let root = parse_document(input)?;
        let placemarks: Vec<&Element> = root
            .descendants()
            .into_iter()
            .filter(|element| element.local_name() == "Placemark")
            .collect();
        placemarks
            .iter()
            .enumerate()
            .rev()
            .map(|(index, placemark)| feature_from_placemark(index, placemark))
            .collect()
    }
}

fn description(feature: &Feature) -> String {
    if let Some(text) = feature.scalar("description") {
        return text.to_string();
    }
    let mut fields = vec![DESCRIPTION_MARKER.to_owned()];
    fields.extend(
        feature
            .properties
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "styleUrl" | "title"))
            .map(|(key, value)| format!("<b>{key}</b>: {}", value.value())),
    );
    fields.join("<br />")
}

fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

/// Make `key` usable as an XML element name.
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

fn coordinates(coords: impl Iterator<Item = Coord<f64>>) -> String {
    coords
        .map(|coord| format!("{},{}", coord.x, coord.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn ring(tag: &str, line: &LineString<f64>) -> String {
    format!(
        "<{tag}><LinearRing><coordinates>{}</coordinates></LinearRing></{tag}>",
        coordinates(line.coords().copied())
    )
}

fn geometry_to_place(geometry: &Geometry) -> Result<String, CodecError> {
    match geometry {
        Geometry::Point(point) => Ok(format!(
            "<Point><coordinates>{}</coordinates></Point>",
            coordinates(std::iter::once(point.0))
        )),
        Geometry::LineString(line) => Ok(format!(
            "<LineString><coordinates>{}</coordinates></LineString>",
            coordinates(line.coords().copied())
        )),
        Geometry::Polygon(polygon) => {
            let mut out = String::from("<Polygon>");
            out.push_str(&ring("outerBoundaryIs", polygon.exterior()));
            for interior in polygon.interiors() {
                out.push_str(&ring("innerBoundaryIs", interior));
            }
            out.push_str("</Polygon>");
            Ok(out)
        }
        other => Err(CodecError::UnsupportedGeometry {
            format: FORMAT,
            kind: other.kind(),
        }),
    }
}

/// A parsed XML element with its direct text.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, CodecError> {
        let mut attributes = Vec::new();
        for parsed in start.attributes() {
            let attribute = parsed.map_err(quick_xml::Error::from)?;
            attributes.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                attribute.unescape_value()?.into_owned(),
            ));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Self::default()
        })
    }

    fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn text(&self) -> &str {
        self.text.trim()
    }

    /// Every element below this one in document order.
    fn descendants(&self) -> Vec<&Self> {
        let mut found = Vec::new();
        let mut pending: Vec<&Self> = self.children.iter().rev().collect();
        while let Some(element) = pending.pop() {
            found.push(element);
            pending.extend(element.children.iter().rev());
        }
        found
    }

    fn find(&self, local_name: &str) -> Option<&Self> {
        self.descendants()
            .into_iter()
            .find(|element| element.local_name() == local_name)
    }
}

fn parse_document(input: &str) -> Result<Element, CodecError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);
    let mut open = vec![Element::default()];
    loop {
        match reader.read_event()? {
            Event::Start(start) => open.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                if let Some(parent) = open.last_mut() {
                    parent.children.push(element);
                }
            }
            Event::End(_) => {
                let closed = open.pop();
                match (closed, open.last_mut()) {
                    (Some(element), Some(parent)) => parent.children.push(element),
                    _ => return Err(invalid("unbalanced closing tag")),
                }
            }
            Event::Text(text) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let root = open.pop().ok_or_else(|| invalid("empty document"))?;
    if !open.is_empty() {
        return Err(invalid(format!("unclosed element <{}>", root.name)));
    }
    Ok(root)
}

fn invalid(reason: impl Into<String>) -> CodecError {
    CodecError::InvalidDocument {
        format: FORMAT,
        reason: reason.into(),
    }
}

fn parse_coordinates(text: &str) -> Result<Vec<Coord<f64>>, CodecError> {
    text.split_whitespace()
        .map(|tuple| {
            let mut axes = tuple.split(',').map(|axis| axis.trim().parse::<f64>());
            match (axes.next(), axes.next()) {
                (Some(Ok(x)), Some(Ok(y))) => Ok(Coord { x, y }),
                _ => Err(CodecError::InvalidCoordinates {
                    text: tuple.to_owned(),
                }),
            }
        })
        .collect()
}

fn coordinates_of(element: &Element) -> Result<Vec<Coord<f64>>, CodecError> {
    element
        .find("coordinates")
        .map_or_else(|| Ok(Vec::new()), |coords| parse_coordinates(coords.text()))
}

fn polygon_from(element: &Element) -> Result<Polygon<f64>, CodecError> {
    let exterior = element
        .find("outerBoundaryIs")
        .map(coordinates_of)
        .transpose()?
        .unwrap_or_default();
    let interiors = element
        .descendants()
        .into_iter()
        .filter(|child| child.local_name() == "innerBoundaryIs")
        .map(|inner| coordinates_of(inner).map(LineString::new))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(LineString::new(exterior), interiors))
}

fn geometry_from(index: usize, placemark: &Element) -> Result<Geometry, CodecError> {
    if let Some(point) = placemark.find("Point") {
        let coord = coordinates_of(point)?
            .into_iter()
            .next()
            .ok_or_else(|| CodecError::InvalidCoordinates {
                text: point.text().to_owned(),
            })?;
        return Ok(Geometry::Point(Point(coord)));
    }
    if let Some(line) = placemark.find("LineString") {
        return Ok(Geometry::LineString(LineString::new(coordinates_of(line)?)));
    }
    if let Some(polygon) = placemark.find("Polygon") {
        return Ok(Geometry::Polygon(polygon_from(polygon)?));
    }
    Err(CodecError::MissingGeometry { index })
}

fn id_from(text: &str) -> Option<FeatureId> {
    if text.is_empty() {
        return None;
    }
    Some(
        text.parse::<i64>()
            .map_or_else(|_| FeatureId::from(text), FeatureId::Integer),
    )
}

fn feature_from_placemark(index: usize, placemark: &Element) -> Result<Feature, CodecError> {
    let mut feature = Feature::new().with_geometry(geometry_from(index, placemark)?);
    feature.id = placemark.attribute("id").and_then(id_from);
    let metadata = placemark
        .children
        .iter()
        .find(|child| child.local_name() == "Metadata")
        .map(|metadata| metadata.children.iter())
        .into_iter()
        .flatten();
    for node in placemark.children.iter().chain(metadata) {
        let name = node.local_name();
        let text = node.text();
        if STRUCTURAL.contains(&name)
            || RESERVED.contains(&name)
            || text.is_empty()
            || text.starts_with(DESCRIPTION_MARKER)
        {
            continue;
        }
        feature.properties.insert(name.to_owned(), text.into());
    }
    if let Some(title) = placemark
        .children
        .iter()
        .find(|child| child.local_name() == "name")
        .map(Element::text)
        .filter(|title| !title.is_empty())
    {
        feature.properties.insert("title".to_owned(), title.into());
    }
    Ok(feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use featureserver_core::wkt::from_wkt;
    use rstest::{fixture, rstest};

    #[fixture]
    fn kml() -> Kml {
        Kml::new("towns").with_base_url("http://localhost/fs")
    }

    fn decode_one(kml: &Kml, document: &str) -> Feature {
        let features = kml.decode(document).expect("decodable");
        let [feature] = features.as_slice() else {
            panic!("expected one feature, got {features:?}");
        };
        feature.clone()
    }

    #[rstest]
    fn line_placemarks_round_trip(kml: Kml) {
        let feature = Feature::new()
            .with_id(9)
            .with_property("title", "T")
            .with_property("foo", "bar")
            .with_geometry(from_wkt("LINESTRING(0 0,1.5 2,3 -4)").expect("valid literal"));
        let document = kml.encode(std::slice::from_ref(&feature)).expect("encodable");
        let decoded = decode_one(&kml, &document);
        assert_eq!(decoded.geometry, feature.geometry);
        assert_eq!(decoded.id, Some(FeatureId::Integer(9)));
        assert_eq!(decoded.scalar("title"), Some(&Value::from("T")));
        assert_eq!(decoded.scalar("foo"), Some(&Value::from("bar")));
        assert_eq!(decoded.properties.len(), 2);
    }

    #[rstest]
    fn polygons_keep_their_holes(kml: Kml) {
        let geometry = from_wkt("POLYGON((0 0,10 0,10 10,0 10,0 0),(2 2,4 2,4 4,2 2))")
            .expect("valid literal");
        let document = kml
            .encode(&[Feature::new().with_geometry(geometry.clone())])
            .expect("encodable");
        assert_eq!(decode_one(&kml, &document).geometry, Some(geometry));
    }

    #[rstest]
    fn builds_generated_descriptions(kml: Kml) {
        let feature = Feature::new()
            .with_property("title", "T")
            .with_property("a&b", "<x>")
            .with_geometry(Geometry::point(0.0, 0.0));
        let placemark = kml
            .encode_feature(&feature)
            .expect("encodable")
            .expect("has a geometry");
        assert!(placemark.contains(
            "<description><![CDATA[Properties:<br /><b>a&b</b>: <x>]]></description>"
        ));
        assert!(placemark.contains("<fs:a_b>&lt;x&gt;</fs:a_b>"));
        assert!(placemark.contains("<styleUrl>#allstyle</styleUrl>"));
    }

    #[rstest]
    fn prefers_the_configured_title_property() {
        let kml = Kml::new("towns").with_title_property("name");
        let feature = Feature::new()
            .with_property("name", "Harbour")
            .with_property("title", "ignored")
            .with_geometry(Geometry::point(0.0, 0.0));
        let placemark = kml
            .encode_feature(&feature)
            .expect("encodable")
            .expect("has a geometry");
        assert!(placemark.contains("<name>Harbour</name>"));
        assert!(!placemark.contains("atom:link"));
    }

    #[rstest]
    fn skips_features_without_geometry(kml: Kml) {
        let bare = Feature::new().with_id(1_i64).with_property("title", "bare");
        assert_eq!(kml.encode_feature(&bare).expect("encodable"), None);
        let located = Feature::new()
            .with_id(2_i64)
            .with_property("title", "located")
            .with_geometry(Geometry::point(1.0, 1.0));
        let document = kml.encode(&[bare, located]).expect("encodable");
        assert_eq!(document.matches("<Placemark").count(), 1);
        assert!(document.contains(r#"<Placemark id="2">"#));
        assert!(!document.contains("bare"));
    }

    #[rstest]
    #[case("MULTIPOLYGON(((0 0,1 0,1 1,0 0)))")]
    #[case("MULTIPOINT((0 0),(1 1))")]
    fn rejects_collections(kml: Kml, #[case] wkt: &str) {
        let feature = Feature::new().with_geometry(from_wkt(wkt).expect("valid literal"));
        let err = kml.encode(&[feature]).expect_err("unsupported");
        assert!(err.is_unsupported_geometry(), "{err:?}");
    }

    #[rstest]
    fn decodes_placemarks_last_first(kml: Kml) {
        let document = r#"<kml><Document>
            <Placemark><name>first</name><Point><coordinates>1,1</coordinates></Point></Placemark>
            <Placemark><name>second</name><Point><coordinates>2,2,0</coordinates></Point></Placemark>
        </Document></kml>"#;
        let titles: Vec<_> = kml
            .decode(document)
            .expect("decodable")
            .iter()
            .filter_map(|feature| feature.scalar("title").map(Value::to_string))
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[rstest]
    fn placemarks_need_a_geometry(kml: Kml) {
        let err = kml
            .decode("<kml><Placemark><name>x</name></Placemark></kml>")
            .expect_err("no geometry");
        assert!(matches!(err, CodecError::MissingGeometry { index: 0 }));
    }

    #[rstest]
    fn reports_broken_xml(kml: Kml) {
        assert!(kml.decode("<kml><Placemark></kml>").is_err());
    }
}
