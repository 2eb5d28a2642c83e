//! Select command implementation for the feature server CLI.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use clap::{Parser, ValueEnum};
use featureserver_core::{Action, BoundingBox, DataSourceConfig, Feature, FeatureId, wkt::to_wkt};
use featureserver_formats::{Encoder, GeoJson, Kml, ProjectionLibrary, ShapefileEncoder};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BASE_URL, ARG_BBOX, ARG_DATABASE, ARG_FEATURE_ID, ARG_FORMAT, ARG_LAYER_CONFIG,
    ARG_MAX_FEATURES, ARG_OUTPUT_DIR, ARG_PROJECTIONS, ARG_START_FEATURE, CliError,
    ENV_SELECT_LAYER_CONFIG, ENV_SELECT_OUTPUT_DIR, layer,
};

/// Payload formats the select command can write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    /// A GeoJSON feature collection on stdout.
    #[default]
    #[value(name = "geojson")]
    GeoJson,
    /// A KML document on stdout.
    Kml,
    /// One WKT literal per line on stdout.
    Wkt,
    /// Shapefile members written into the output directory.
    #[value(name = "shp")]
    #[serde(rename = "shp")]
    Shapefile,
}

/// CLI arguments for the `select` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read features from a layer described by a JSON data source \
                 configuration and write them as GeoJSON, KML, WKT or a \
                 shapefile. Options can come from CLI flags, configuration \
                 files, or environment variables.",
    about = "Select features from a layer"
)]
#[ortho_config(prefix = "FEATURESERVER")]
pub(crate) struct SelectArgs {
    /// Path to the JSON layer configuration.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) layer_config: Option<Utf8PathBuf>,
    /// Override the SQLite database named by the layer's dsn.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Only return features intersecting `minx,miny,maxx,maxy`.
    #[arg(long = ARG_BBOX, value_name = "minx,miny,maxx,maxy")]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
    /// Only return the feature with this identifier.
    #[arg(long = ARG_FEATURE_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) id: Option<String>,
    /// Return at most this many features.
    #[arg(long = ARG_MAX_FEATURES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_features: Option<u64>,
    /// Skip this many features first.
    #[arg(long = ARG_START_FEATURE, value_name = "count")]
    #[serde(default)]
    pub(crate) start_feature: Option<u64>,
    /// Output format.
    #[arg(long = ARG_FORMAT, value_enum, value_name = "format")]
    #[serde(default)]
    pub(crate) format: Option<OutputFormat>,
    /// Directory receiving shapefile members.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Root of the `epsg/<srid>.prj` projection library.
    #[arg(long = ARG_PROJECTIONS, value_name = "dir")]
    #[serde(default)]
    pub(crate) projections: Option<Utf8PathBuf>,
    /// Base URL used for KML self and edit links.
    #[arg(long = ARG_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,
}

impl SelectArgs {
    pub(crate) fn into_config(self) -> Result<SelectConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SelectConfig::try_from(merged)
    }
}

/// Resolved `select` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectConfig {
    pub(crate) layer_config: Utf8PathBuf,
    pub(crate) database: Option<Utf8PathBuf>,
    pub(crate) bbox: Option<BoundingBox>,
    pub(crate) id: Option<FeatureId>,
    pub(crate) max_features: Option<u64>,
    pub(crate) start_feature: Option<u64>,
    pub(crate) format: OutputFormat,
    /// Always set when `format` is [`OutputFormat::Shapefile`].
    pub(crate) output_dir: Option<Utf8PathBuf>,
    pub(crate) projections: Option<Utf8PathBuf>,
    pub(crate) base_url: Option<String>,
}

impl SelectConfig {
    /// The select action described by the options.
    pub(crate) fn action(&self) -> Action {
        let action = self
            .id
            .clone()
            .map_or_else(Action::select, Action::select_by_id)
            .with_paging(self.max_features, self.start_feature);
        match self.bbox {
            Some(bbox) => action.with_bbox(bbox),
            None => action,
        }
    }
}

fn parse_feature_id(text: String) -> FeatureId {
    text.parse::<i64>()
        .map_or_else(|_| FeatureId::from(text.clone()), FeatureId::from)
}

impl TryFrom<SelectArgs> for SelectConfig {
    type Error = CliError;

    fn try_from(args: SelectArgs) -> Result<Self, Self::Error> {
        let layer_config = args.layer_config.ok_or(CliError::MissingArgument {
            field: ARG_LAYER_CONFIG,
            env: ENV_SELECT_LAYER_CONFIG,
        })?;
        let bbox = args
            .bbox
            .as_deref()
            .map(str::parse::<BoundingBox>)
            .transpose()?;
        let format = args.format.unwrap_or_default();
        if format == OutputFormat::Shapefile && args.output_dir.is_none() {
            return Err(CliError::MissingArgument {
                field: ARG_OUTPUT_DIR,
                env: ENV_SELECT_OUTPUT_DIR,
            });
        }
        Ok(Self {
            layer_config,
            database: args.database,
            bbox,
            id: args.id.map(parse_feature_id),
            max_features: args.max_features,
            start_feature: args.start_feature,
            format,
            output_dir: args.output_dir,
            projections: args.projections,
            base_url: args.base_url,
        })
    }
}

pub(crate) fn run_select(args: SelectArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_select_with(&config, writer)
}

pub(crate) fn run_select_with(config: &SelectConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    layer::require_existing(&config.layer_config, ARG_LAYER_CONFIG)?;
    let source = layer::open_source(&config.layer_config, config.database.as_deref(), ARG_DATABASE)?;
    let features = source.select(&config.action())?;
    info!(
        "selected {} features from layer {}",
        features.len(),
        source.config().name
    );
    write_features(config, source.config(), &features, writer)
}

fn write_features(
    config: &SelectConfig,
    layer: &DataSourceConfig,
    features: &[Feature],
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    match config.format {
        OutputFormat::GeoJson => {
            let document = GeoJson::new().with_crs(layer.srid_out).encode(features)?;
            let payload =
                serde_json::to_string_pretty(&document).map_err(CliError::SerialiseOutput)?;
            write_text(writer, &payload)
        }
        OutputFormat::Kml => {
            let codec = config
                .base_url
                .as_ref()
                .map_or_else(|| Kml::new(&layer.name), |url| Kml::new(&layer.name).with_base_url(url));
            let document = codec.encode(features)?;
            write_text(writer, &document)
        }
        OutputFormat::Wkt => {
            let lines: Vec<String> = features
                .iter()
                .filter_map(|feature| feature.geometry.as_ref().map(to_wkt))
                .collect();
            write_text(writer, &lines.join("\n"))
        }
        OutputFormat::Shapefile => {
            let dir = config
                .output_dir
                .as_deref()
                .ok_or(CliError::MissingArgument {
                    field: ARG_OUTPUT_DIR,
                    env: ENV_SELECT_OUTPUT_DIR,
                })?;
            write_shapefile(config, layer, features, dir, writer)
        }
    }
}

fn write_text(writer: &mut dyn Write, payload: &str) -> Result<(), CliError> {
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

fn write_shapefile(
    config: &SelectConfig,
    layer: &DataSourceConfig,
    features: &[Feature],
    dir: &Utf8Path,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let encoder = match &config.projections {
        Some(root) => ShapefileEncoder::new().with_projections(ProjectionLibrary::open(root)?),
        None => ShapefileEncoder::new(),
    };
    let buffers = encoder.encode(features)?;
    let output_error = |source| CliError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    };
    fs_utf8::Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(output_error)?;
    let output = fs_utf8::Dir::open_ambient_dir(dir, ambient_authority()).map_err(output_error)?;
    for (name, contents) in buffers.files(&layer.name) {
        let path = dir.join(&name);
        output
            .write(&name, &contents)
            .map_err(|source| CliError::WriteShapefile {
                path: path.clone(),
                source,
            })?;
        write_text(writer, path.as_str())?;
    }
    Ok(())
}
