//! Behaviour-driven step definitions driving the select CLI scenarios.

use super::helpers::LayerFixture;
use super::*;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

struct SelectWorld {
    layer: RefCell<Option<LayerFixture>>,
    include_layer: RefCell<bool>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl SelectWorld {
    fn new() -> Self {
        Self {
            layer: RefCell::new(None),
            include_layer: RefCell::new(true),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn run(&self, extra: &[&str]) {
        let mut argv = vec!["featureserver".to_owned(), "select".to_owned()];
        if *self.include_layer.borrow() {
            let layer = self.layer.borrow();
            let fixture = layer.as_ref().expect("layer should be created first");
            argv.push(fixture.config_path().into_string());
        }
        argv.extend(extra.iter().map(|arg| (*arg).to_owned()));
        let outcome = Cli::try_parse_from(argv)
            .map_err(CliError::from)
            .and_then(|cli| {
                let mut buffer = self.stdout.borrow_mut();
                run_command(cli.command, &mut *buffer)
            });
        self.result.replace(Some(outcome));
    }

    fn output(&self) -> String {
        let borrowed = self.result.borrow();
        let result = borrowed.as_ref().expect("result recorded");
        if let Err(err) = result {
            panic!("expected success, found {err:?}");
        }
        String::from_utf8(self.stdout.borrow().clone()).expect("stdout utf-8")
    }
}

#[fixture]
fn world() -> SelectWorld {
    SelectWorld::new()
}

#[given("a towns layer with towns at 5 5 and 50 50")]
fn towns_layer(#[from(world)] world: &SelectWorld) {
    let fixture = LayerFixture::with_towns(&[("inside", 5.0, 5.0), ("outside", 50.0, 50.0)]);
    world.layer.replace(Some(fixture));
}

#[when("I run the select command with \"--bbox 0,0,10,10\"")]
fn run_with_bbox(#[from(world)] world: &SelectWorld) {
    world.run(&["--bbox", "0,0,10,10"]);
}

#[when("I run the select command with \"--format kml\"")]
fn run_with_kml(#[from(world)] world: &SelectWorld) {
    world.run(&["--format", "kml"]);
}

#[when("I run the select command without a layer configuration")]
fn run_without_layer(#[from(world)] world: &SelectWorld) {
    *world.include_layer.borrow_mut() = false;
    world.run(&[]);
}

#[then("the command prints a collection with one town named \"inside\"")]
fn prints_one_town(#[from(world)] world: &SelectWorld) {
    let document: serde_json::Value =
        serde_json::from_str(&world.output()).expect("output should be JSON");
    assert_eq!(document["type"], "FeatureCollection");
    assert_eq!(document["features"].as_array().map(Vec::len), Some(1));
    assert_eq!(document["features"][0]["properties"]["name"], "inside");
    assert_eq!(document["crs"]["properties"]["name"], "EPSG:4326");
}

#[then("the command prints two placemarks")]
fn prints_two_placemarks(#[from(world)] world: &SelectWorld) {
    let output = world.output();
    assert!(output.starts_with("<?xml"), "{output}");
    assert_eq!(output.matches("<Placemark").count(), 2);
}

#[then("the command fails because the layer configuration is missing")]
fn fails_without_layer(#[from(world)] world: &SelectWorld) {
    let borrowed = world.result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::MissingArgument { field, .. } => assert_eq!(*field, ARG_LAYER_CONFIG),
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

macro_rules! register_select_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/select_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: SelectWorld) {
            let _ = world;
        }
    };
}

register_select_scenario!(select_geojson, "selecting a layer as GeoJSON");
register_select_scenario!(select_kml, "selecting a layer as KML");
register_select_scenario!(select_missing_layer, "rejecting a missing layer configuration");
