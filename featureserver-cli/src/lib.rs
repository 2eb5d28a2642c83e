//! Command-line access to feature server layers.
//!
//! Layers are described by the same JSON data source configuration the
//! library accepts and are served from SQLite databases.
#![forbid(unsafe_code)]

mod error;
mod extent;
mod layer;
mod select;

use std::io::Write;

use clap::{Parser, Subcommand};

pub use error::CliError;
use extent::{ExtentArgs, run_extent};
use select::{SelectArgs, run_select};

const ARG_LAYER_CONFIG: &str = "layer-config";
const ARG_DATABASE: &str = "database";
const ARG_BBOX: &str = "bbox";
const ARG_FEATURE_ID: &str = "id";
const ARG_MAX_FEATURES: &str = "max-features";
const ARG_START_FEATURE: &str = "start-feature";
const ARG_FORMAT: &str = "format";
const ARG_OUTPUT_DIR: &str = "output-dir";
const ARG_PROJECTIONS: &str = "projections";
const ARG_BASE_URL: &str = "base-url";
const ENV_SELECT_LAYER_CONFIG: &str = "FEATURESERVER_CMDS_SELECT_LAYER_CONFIG";
const ENV_SELECT_OUTPUT_DIR: &str = "FEATURESERVER_CMDS_SELECT_OUTPUT_DIR";
const ENV_EXTENT_LAYER_CONFIG: &str = "FEATURESERVER_CMDS_EXTENT_LAYER_CONFIG";

/// Run the feature server CLI with the current process arguments and
/// environment, writing results to stdout.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Select(args) => run_select(args, writer),
        Command::Extent(args) => run_extent(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "featureserver",
    about = "Query feature server layers from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Select features and write them in one of the supported formats.
    Select(SelectArgs),
    /// Print the bounding box of a layer.
    Extent(ExtentArgs),
}

#[cfg(test)]
mod tests;
