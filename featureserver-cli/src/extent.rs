//! Extent command implementation for the feature server CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use log::warn;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{ARG_DATABASE, ARG_LAYER_CONFIG, CliError, ENV_EXTENT_LAYER_CONFIG, layer};

/// CLI arguments for the `extent` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print the bounding box of every geometry stored in a layer \
                 as `minx miny maxx maxy`. Layers the store cannot measure \
                 report `-1 -1 -1 -1`.",
    about = "Report the extent of a layer"
)]
#[ortho_config(prefix = "FEATURESERVER")]
pub(crate) struct ExtentArgs {
    /// Path to the JSON layer configuration.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) layer_config: Option<Utf8PathBuf>,
    /// Override the SQLite database named by the layer's dsn.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

pub(crate) fn run_extent(args: ExtentArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let layer_config = merged.layer_config.ok_or(CliError::MissingArgument {
        field: ARG_LAYER_CONFIG,
        env: ENV_EXTENT_LAYER_CONFIG,
    })?;
    layer::require_existing(&layer_config, ARG_LAYER_CONFIG)?;
    let source = layer::open_source(&layer_config, merged.database.as_deref(), ARG_DATABASE)?;
    let extent = source.extent();
    if !extent.is_found() {
        warn!("reporting the default extent for layer {}", source.config().name);
    }
    writeln!(writer, "{}", extent.value()).map_err(CliError::WriteOutput)
}
