//! Focused unit tests covering select and extent configuration and output.

use super::helpers::LayerFixture;
use super::*;
use crate::layer::database_path;
use crate::select::{OutputFormat, SelectConfig, run_select_with};
use camino::{Utf8Path, Utf8PathBuf};
use featureserver_core::{BoundingBox, DataSourceConfig, FeatureId};
use rstest::rstest;

fn select_args(layer_config: Option<Utf8PathBuf>) -> SelectArgs {
    SelectArgs {
        layer_config,
        ..SelectArgs::default()
    }
}

fn resolved(fixture: &LayerFixture, format: OutputFormat) -> SelectConfig {
    SelectConfig {
        layer_config: fixture.config_path(),
        database: None,
        bbox: None,
        id: None,
        max_features: None,
        start_feature: None,
        format,
        output_dir: Some(fixture.root().join("out")),
        projections: None,
        base_url: None,
    }
}

#[rstest]
fn converting_without_layer_config_errors() {
    let err = SelectConfig::try_from(select_args(None)).expect_err("missing layer should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_LAYER_CONFIG);
            assert_eq!(env, ENV_SELECT_LAYER_CONFIG);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn shapefiles_require_an_output_directory() {
    let args = SelectArgs {
        format: Some(OutputFormat::Shapefile),
        ..select_args(Some(Utf8PathBuf::from("towns.json")))
    };
    let err = SelectConfig::try_from(args).expect_err("missing output dir should error");
    assert!(
        matches!(err, CliError::MissingArgument { field, .. } if field == ARG_OUTPUT_DIR),
        "{err:?}"
    );
}

#[rstest]
fn invalid_bounding_boxes_are_rejected() {
    let args = SelectArgs {
        bbox: Some("1,2,3".to_owned()),
        ..select_args(Some(Utf8PathBuf::from("towns.json")))
    };
    let err = SelectConfig::try_from(args).expect_err("bad bbox should error");
    assert!(matches!(err, CliError::InvalidBoundingBox(_)), "{err:?}");
}

#[rstest]
#[case("7", FeatureId::Integer(7))]
#[case("harbour", FeatureId::Text("harbour".to_owned()))]
fn identifiers_prefer_integers(#[case] text: &str, #[case] expected: FeatureId) {
    let args = SelectArgs {
        id: Some(text.to_owned()),
        ..select_args(Some(Utf8PathBuf::from("towns.json")))
    };
    let config = SelectConfig::try_from(args).expect("config should build");
    assert_eq!(config.id, Some(expected));
    assert_eq!(config.format, OutputFormat::GeoJson);
}

#[rstest]
fn actions_carry_bbox_and_paging() {
    let args = SelectArgs {
        bbox: Some("0,0,10,10".to_owned()),
        max_features: Some(5),
        start_feature: Some(2),
        ..select_args(Some(Utf8PathBuf::from("towns.json")))
    };
    let action = SelectConfig::try_from(args)
        .expect("config should build")
        .action();
    let expected: BoundingBox = "0,0,10,10".parse().expect("valid bbox");
    assert_eq!(action.bbox, Some(expected));
    assert_eq!(action.max_features, Some(5));
    assert_eq!(action.start_feature, Some(2));
}

#[rstest]
#[case(None, "/data/layers/towns.db")]
#[case(Some("/srv/override.db"), "/srv/override.db")]
fn database_paths_resolve_against_the_configuration(
    #[case] database: Option<&str>,
    #[case] expected: &str,
) {
    let mut config = DataSourceConfig::new("towns", "towns");
    config.dsn = "towns.db".to_owned();
    let path = database_path(
        Utf8Path::new("/data/layers/towns.json"),
        &config,
        database.map(Utf8Path::new),
        ARG_DATABASE,
    )
    .expect("resolved path");
    assert_eq!(path, Utf8PathBuf::from(expected));
}

#[rstest]
fn layers_without_dsn_need_a_database() {
    let config = DataSourceConfig::new("towns", "towns");
    let err = database_path(Utf8Path::new("towns.json"), &config, None, ARG_DATABASE)
        .expect_err("missing dsn");
    assert!(matches!(err, CliError::MissingDatabase { .. }), "{err:?}");
}

#[rstest]
fn missing_layer_configurations_are_reported() {
    let fixture = LayerFixture::with_towns(&[]);
    let mut config = resolved(&fixture, OutputFormat::GeoJson);
    config.layer_config = fixture.root().join("absent.json");
    let mut output = Vec::new();
    let err = run_select_with(&config, &mut output).expect_err("missing file");
    match err {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_LAYER_CONFIG),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
}

#[rstest]
fn writes_wkt_lines() {
    let fixture = LayerFixture::with_towns(&[("a", 1.0, 2.0), ("b", 3.0, 4.0)]);
    let mut output = Vec::new();
    run_select_with(&resolved(&fixture, OutputFormat::Wkt), &mut output).expect("select");
    let text = String::from_utf8(output).expect("utf-8 output");
    assert_eq!(text.lines().collect::<Vec<_>>(), ["POINT(1 2)", "POINT(3 4)"]);
}

#[rstest]
fn writes_shapefile_members() {
    let fixture = LayerFixture::with_towns(&[("a", 1.0, 2.0)]);
    let mut output = Vec::new();
    run_select_with(&resolved(&fixture, OutputFormat::Shapefile), &mut output).expect("select");
    for extension in ["shp", "shx", "dbf"] {
        let path = fixture.root().join("out").join(format!("towns.{extension}"));
        assert!(path.is_file(), "expected {path}");
    }
    let text = String::from_utf8(output).expect("utf-8 output");
    assert_eq!(text.lines().count(), 3);
}

#[rstest]
fn extent_reports_the_layer_bounds() {
    let fixture = LayerFixture::with_towns(&[("a", 1.0, 2.0), ("b", 3.0, 4.0)]);
    let args = ExtentArgs {
        layer_config: Some(fixture.config_path()),
        database: None,
    };
    let mut output = Vec::new();
    run_extent(args, &mut output).expect("extent");
    let text = String::from_utf8(output).expect("utf-8 output");
    assert_eq!(text.trim(), "1 2 3 4");
}
