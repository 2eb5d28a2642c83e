//! Loading layer configurations and binding them to a SQLite store.

use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use featureserver_core::DataSourceConfig;
use featureserver_store::{DataSource, SqliteStore};
use log::debug;

use crate::CliError;

/// Fail unless `path` names an existing regular file.
pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let metadata = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority()).and_then(|dir| {
        path.file_name()
            .map_or_else(|| dir.dir_metadata(), |name| dir.metadata(name))
    });
    match metadata {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read and validate a JSON layer configuration.
pub(crate) fn load_config(path: &Utf8Path) -> Result<DataSourceConfig, CliError> {
    let read_error = |source| CliError::ReadLayerConfig {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs_utf8::File::open_ambient(path, ambient_authority()).map_err(read_error)?;
    let mut json = String::new();
    file.read_to_string(&mut json).map_err(read_error)?;
    DataSourceConfig::from_json_str(&json).map_err(|source| CliError::ParseLayerConfig {
        path: path.to_path_buf(),
        source,
    })
}

/// Database file for a layer.
///
/// An explicit override wins; otherwise the configured dsn is used, with
/// relative paths resolved against the configuration file's directory.
pub(crate) fn database_path(
    config_path: &Utf8Path,
    config: &DataSourceConfig,
    database: Option<&Utf8Path>,
    field: &'static str,
) -> Result<Utf8PathBuf, CliError> {
    if let Some(path) = database {
        return Ok(path.to_path_buf());
    }
    let dsn = config.dsn.trim();
    if dsn.is_empty() {
        return Err(CliError::MissingDatabase {
            layer: config.name.clone(),
            field,
        });
    }
    let dsn_path = Utf8Path::new(dsn);
    Ok(match config_path.parent() {
        Some(parent) if dsn_path.is_relative() => parent.join(dsn_path),
        _ => dsn_path.to_path_buf(),
    })
}

/// Load the layer at `config_path` and bind it to its SQLite database.
pub(crate) fn open_source(
    config_path: &Utf8Path,
    database: Option<&Utf8Path>,
    field: &'static str,
) -> Result<DataSource<SqliteStore>, CliError> {
    let config = load_config(config_path)?;
    let path = database_path(config_path, &config, database, field)?;
    require_existing(&path, field)?;
    debug!("serving layer {} from {path}", config.name);
    Ok(DataSource::new(config, SqliteStore::new(path)))
}
