//! Layer configuration for a spatial data source.
//!
//! A [`DataSourceConfig`] is immutable once a data source is built from it.
//! Defaults follow the usual PostGIS layout: `gid` identifiers, a
//! `the_geom` geometry column and WGS84 coordinates.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a [`DataSourceConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The encoding name is not one the server can decode.
    #[error("unsupported character encoding {name:?}")]
    UnknownEncoding {
        /// The rejected name.
        name: String,
    },
    /// The JSON document could not be decoded.
    #[error("failed to parse data source configuration: {source}")]
    Parse {
        /// JSON decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A required field was blank.
    #[error("data source {name:?} has an empty {field}")]
    EmptyField {
        /// Name of the data source.
        name: String,
        /// The blank field.
        field: &'static str,
    },
}

/// Character encodings byte strings from the store may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TextEncoding {
    /// UTF-8; invalid sequences are replaced.
    #[default]
    Utf8,
    /// ISO-8859-1.
    Latin1,
}

impl TextEncoding {
    /// Canonical name of the encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decode raw bytes into text.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().copied().map(char::from).collect(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextEncoding {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            _ => Err(ConfigError::UnknownEncoding {
                name: name.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = ConfigError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<TextEncoding> for String {
    fn from(encoding: TextEncoding) -> Self {
        encoding.as_str().to_owned()
    }
}

fn default_schema() -> String {
    "public".to_owned()
}

fn default_fid() -> String {
    "gid".to_owned()
}

fn default_geometry() -> String {
    "the_geom".to_owned()
}

const fn default_srid() -> u32 {
    4326
}

fn default_attribute_cols() -> String {
    "*".to_owned()
}

const fn default_true() -> bool {
    true
}

/// Description of one spatial layer and how to reach it.
///
/// # Examples
/// ```
/// use featureserver_core::DataSourceConfig;
///
/// let config = DataSourceConfig::from_json_str(
///     r#"{ "name": "roads", "layer": "roads", "dsn": "roads.db" }"#,
/// ).unwrap();
/// assert_eq!(config.fid, "gid");
/// assert_eq!(config.qualified_table(), r#""public"."roads""#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Name reported in errors.
    pub name: String,
    /// Schema holding the table.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Table name.
    pub layer: String,
    /// Identifier column.
    #[serde(default = "default_fid")]
    pub fid: String,
    /// Geometry column.
    #[serde(default = "default_geometry")]
    pub geometry: String,
    /// Native spatial reference of the stored geometries.
    #[serde(default = "default_srid")]
    pub srid: u32,
    /// Spatial reference features are presented in.
    #[serde(default = "default_srid")]
    pub srid_out: u32,
    /// Comma-separated attribute columns, or `*`.
    #[serde(default = "default_attribute_cols")]
    pub attribute_cols: String,
    /// `ORDER BY` clause, empty for store order.
    #[serde(default)]
    pub order: String,
    /// Whether commits are honoured.
    #[serde(default = "default_true")]
    pub writable: bool,
    /// Encoding for byte strings read from the store.
    #[serde(default)]
    pub encoding: TextEncoding,
    /// Whether attributes referenced by external filters are added to selects.
    #[serde(default = "default_true")]
    pub filter_attributes: bool,
    /// Optional hstore column holding dynamic attributes.
    #[serde(default)]
    pub hstore: Option<String>,
    /// Optional version column.
    #[serde(default)]
    pub version: Option<String>,
    /// Optional elevation column.
    #[serde(default)]
    pub elevation: Option<String>,
    /// Extra projected expressions appended to selects.
    #[serde(default)]
    pub additional_cols: Vec<String>,
    /// Store connection string.
    #[serde(default)]
    pub dsn: String,
}

impl DataSourceConfig {
    /// Configuration with defaults for the named layer.
    pub fn new(name: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: default_schema(),
            layer: layer.into(),
            fid: default_fid(),
            geometry: default_geometry(),
            srid: default_srid(),
            srid_out: default_srid(),
            attribute_cols: default_attribute_cols(),
            order: String::new(),
            writable: true,
            encoding: TextEncoding::default(),
            filter_attributes: true,
            hstore: None,
            version: None,
            elevation: None,
            additional_cols: Vec::new(),
            dsn: String::new(),
        }
        .normalised()
    }

    /// Load a configuration from JSON, applying defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for invalid JSON or unknown encodings
    /// and [`ConfigError::EmptyField`] when the layer name is blank.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|source| ConfigError::Parse { source })?;
        config.normalised().validated()
    }

    /// Strip quoting from schema and table names.
    #[must_use]
    pub fn normalised(mut self) -> Self {
        self.schema = strip_identifier(&self.schema);
        self.layer = strip_identifier(&self.layer);
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.layer.is_empty() {
            return Err(ConfigError::EmptyField {
                name: self.name,
                field: "layer",
            });
        }
        Ok(self)
    }

    /// `"schema"."table"`.
    #[must_use]
    pub fn qualified_table(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.layer)
    }

    /// Name of the identifier sequence, `<table>_<fid>_seq`.
    #[must_use]
    pub fn id_sequence(&self) -> String {
        format!("{}_{}_seq", self.layer, self.fid)
    }

    /// Whether every column is selected.
    #[must_use]
    pub fn selects_all_columns(&self) -> bool {
        self.attribute_cols.trim() == "*"
    }

    /// Configured attribute columns, split and trimmed.
    #[must_use]
    pub fn attribute_columns(&self) -> Vec<String> {
        self.attribute_cols
            .split(',')
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Every column the layer exposes: attributes, geometry, identifier and
    /// the optional version and elevation columns.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut columns = self.attribute_columns();
        columns.push(self.geometry.clone());
        columns.push(self.fid.clone());
        columns.extend(self.version.iter().cloned());
        columns.extend(self.elevation.iter().cloned());
        columns
    }
}

fn strip_identifier(name: &str) -> String {
    name.trim_matches(|ch| ch == '"' || ch == ' ').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn applies_defaults() {
        let config = DataSourceConfig::from_json_str(r#"{"name": "parks", "layer": "parks"}"#)
            .expect("valid config");
        assert_eq!(config.schema, "public");
        assert_eq!(config.geometry, "the_geom");
        assert_eq!(config.srid, 4326);
        assert_eq!(config.srid_out, 4326);
        assert!(config.writable);
        assert!(config.selects_all_columns());
        assert_eq!(config.encoding, TextEncoding::Utf8);
    }

    #[rstest]
    fn strips_quoted_identifiers() {
        let config = DataSourceConfig::new("parks", " \"Parks\" ");
        assert_eq!(config.layer, "Parks");
        assert_eq!(config.qualified_table(), "\"public\".\"Parks\"");
        assert_eq!(config.id_sequence(), "Parks_gid_seq");
    }

    #[rstest]
    fn rejects_unknown_encoding() {
        let err = DataSourceConfig::from_json_str(
            r#"{"name": "parks", "layer": "parks", "encoding": "klingon"}"#,
        )
        .expect_err("unknown encoding");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[rstest]
    fn rejects_blank_layer() {
        let err = DataSourceConfig::from_json_str(r#"{"name": "parks", "layer": "\"\""}"#)
            .expect_err("blank layer");
        assert!(matches!(err, ConfigError::EmptyField { field: "layer", .. }));
    }

    #[rstest]
    fn lists_optional_columns() {
        let config = DataSourceConfig {
            attribute_cols: "name, pop".into(),
            version: Some("rev".into()),
            elevation: Some("ele".into()),
            ..DataSourceConfig::new("parks", "parks")
        };
        assert_eq!(
            config.columns(),
            vec!["name", "pop", "the_geom", "gid", "rev", "ele"]
        );
    }

    #[rstest]
    #[case(TextEncoding::Utf8, b"caf\xc3\xa9".as_slice(), "café")]
    #[case(TextEncoding::Latin1, b"caf\xe9".as_slice(), "café")]
    fn decodes_bytes(#[case] encoding: TextEncoding, #[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(encoding.decode(bytes), expected);
    }
}
