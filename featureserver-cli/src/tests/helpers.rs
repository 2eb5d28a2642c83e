//! Test helpers creating SQLite layers and their JSON configurations.

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::Connection;
use std::fs;
use tempfile::TempDir;

/// A towns layer on disk: a database, its configuration and scratch space.
pub(super) struct LayerFixture {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl LayerFixture {
    /// Create a towns table holding `towns` as `(name, x, y)` rows and a
    /// configuration pointing at it through a relative dsn.
    pub(super) fn with_towns(towns: &[(&str, f64, f64)]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        let connection = Connection::open(root.join("towns.db")).expect("create database");
        connection
            .execute_batch(
                "CREATE TABLE towns (
                    gid INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT,
                    the_geom TEXT
                )",
            )
            .expect("create towns table");
        for (name, x, y) in towns {
            connection
                .execute(
                    "INSERT INTO towns (name, the_geom) VALUES (?1, ?2)",
                    rusqlite::params![name, format!("SRID=4326;POINT({x} {y})")],
                )
                .expect("insert town");
        }
        let config = r#"{
            "name": "towns",
            "schema": "main",
            "layer": "towns",
            "attribute_cols": "name",
            "dsn": "towns.db"
        }"#;
        fs::write(root.join("towns.json"), config).expect("write layer configuration");
        Self { _dir: dir, root }
    }

    pub(super) fn config_path(&self) -> Utf8PathBuf {
        self.root.join("towns.json")
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }
}
