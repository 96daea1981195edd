//! End-to-end flows through the controller.

mod common;

use common::{area_bounds, image, ManualClock, ScriptedApi, SequentialIds};
use geocanvas_client::{
    AppController, ClientOptions, ContextEnrichment, DrawEvent, DrawToolkit, HeadlessRenderer,
    LayerAction, MapContext, MapRenderer, MemoryToolkit, SessionError, UploadJobCoordinator, UploadSource,
    UNKNOWN_LOCATION,
};
use geocanvas_cloud::{GeocodeApi, Result, WeatherApi, WeatherReport};
use geocanvas_core::paint::{project, DrawLayer, PaintProperty};
use geocanvas_core::{FeatureId, Geometry, LngLat, VectorFeature};
use serde_json::json;

struct NoWeather;

impl WeatherApi for NoWeather {
    async fn current_weather(&self, _lat: f64, _lon: f64) -> Result<WeatherReport> {
        Err(geocanvas_cloud::CloudError::Service("no key".into()))
    }
}

struct FixedPlace;

impl GeocodeApi for FixedPlace {
    async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> Result<Option<String>> {
        Ok(Some("Lisbon, Portugal".into()))
    }
}

type App = AppController<
    HeadlessRenderer,
    MemoryToolkit,
    ScriptedApi,
    NoWeather,
    FixedPlace,
    ManualClock,
    SequentialIds,
>;

fn app(api: ScriptedApi) -> App {
    let uploads =
        UploadJobCoordinator::with_parts(api, ManualClock::default(), SequentialIds::default());
    let app = AppController::new(
        MapContext::new(HeadlessRenderer::loaded()),
        MemoryToolkit::new(),
        uploads,
        ContextEnrichment::new(Some(NoWeather), Some(FixedPlace)),
        ClientOptions::default(),
    );
    app.on_style_loaded();
    app
}

fn line(id: &str) -> VectorFeature {
    VectorFeature::new(
        id,
        Geometry::LineString {
            coordinates: vec![vec![0.0, 0.0], vec![1.0, 1.0]],
        },
    )
}

#[test]
fn picker_changes_apply_to_new_features_only() {
    let app = app(ScriptedApi::new());
    app.set_stroke_color("#0F0").unwrap();
    app.on_draw_event(DrawEvent::Create(vec![line("a")]));
    app.set_stroke_color("#0000ff").unwrap();
    app.on_draw_event(DrawEvent::Create(vec![line("b")]));

    let session = app.session();
    let features = session.toolkit().get_all();
    let plan = project(features.iter(), &app.context().style());
    let color = |id: &str| {
        let feature = features.get(&FeatureId::from(id)).cloned().unwrap();
        plan.evaluate(DrawLayer::LineInactive, PaintProperty::LineColor, &feature)
    };
    assert_eq!(color("a"), Some(json!("#00ff00")));
    assert_eq!(color("b"), Some(json!("#0000ff")));
    assert_eq!(
        app.context().renderer().paint("gl-draw-line-active", "line-color"),
        Some(&json!(["match", ["get", "id"], "a", "#00ff00", "b", "#0000ff", "#0000ff"]))
    );
}

#[test]
fn invalid_picker_input_is_reported() {
    let app = app(ScriptedApi::new());
    assert!(matches!(
        app.set_fill_color("red"),
        Err(SessionError::Core(geocanvas_core::Error::InvalidColor(_)))
    ));
    assert!(app.set_fill_opacity(1.5).is_err());
    assert!(app.set_stroke_width(4.0).is_ok());
    assert_eq!(app.context().results().len(), 2);
    assert_eq!(app.context().style().stroke_width(), 4.0);
}

#[test]
fn basemap_switch_restores_features_and_styles() {
    let app = app(ScriptedApi::new());
    app.set_stroke_width(5.0).unwrap();
    app.on_draw_event(DrawEvent::Create(vec![line("a")]));

    app.before_style_change();
    app.context().renderer_mut().set_style();
    app.session_mut().toolkit_mut().set_all(Default::default());
    app.context().renderer_mut().finish_loading();
    app.on_style_loaded();

    let session = app.session();
    let restored = session.toolkit().get(&FeatureId::from("a")).unwrap();
    assert_eq!(restored.properties["strokeWidth"], json!(5.0));
    assert!(app.context().renderer().has_layer("gl-draw-line-inactive"));
    assert_eq!(
        app.context().renderer().paint("gl-draw-line-inactive", "line-width"),
        Some(&json!(["match", ["get", "id"], "a", 5.0, 5.0]))
    );
}

#[test]
fn deleting_a_feature_drops_its_style() {
    let app = app(ScriptedApi::new());
    app.on_draw_event(DrawEvent::Create(vec![line("a"), line("b")]));
    let removed = app.session_mut().toolkit_mut().delete(&FeatureId::from("a"));
    app.on_draw_event(DrawEvent::Delete(removed.into_iter().collect()));

    assert_eq!(app.session().styles().len(), 1);
    assert_eq!(
        app.context().renderer().paint("gl-draw-line-inactive", "line-color"),
        Some(&json!(["match", ["get", "id"], "b", "#000000", "#000000"]))
    );
}

#[test]
fn geojson_round_trip_through_the_editor() {
    let app = app(ScriptedApi::new());
    assert!(matches!(app.export_geojson(), Err(SessionError::Export(_))));

    app.on_draw_event(DrawEvent::Create(vec![line("a")]));
    app.on_draw_event(DrawEvent::SelectionChange(vec![line("a")]));
    app.save_properties(vec![("name".into(), "canal".into())]).unwrap();

    let text = app.export_geojson().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let props = &doc["features"][0]["properties"];
    assert_eq!(props["name"], json!("canal"));
    assert_eq!(props["strokeColor"], json!("#000000"));

    assert_eq!(app.import_geojson(&text).unwrap(), 1);
    assert!(app.context().renderer().has_layer("imported-geojson-1-line"));
}

#[tokio::test]
async fn upload_then_enrich_then_hide() {
    let api = ScriptedApi::new().ready_on(
        "png-export/job-1_area.png",
        2,
        image("https://bucket.example/area.png", area_bounds()),
    );
    let app = app(api);
    app.set_user_location(Some(LngLat::new(20.5, 9.5)));

    let shown = app
        .upload(Some(UploadSource::file("area.tif", vec![0; 16])))
        .await
        .unwrap();

    let results = app.context().results();
    assert!(results.contains("You are 0.00 km from the image location."));
    assert!(results.contains("The image is located near Lisbon, Portugal."));
    assert!(!results.contains(UNKNOWN_LOCATION));
    drop(results);

    assert!(app.layer_action(LayerAction::SetVisibility(shown.layer_id.clone(), false)));
    assert_eq!(
        app.context().renderer().layout(&shown.layer_id, "visibility"),
        Some(&json!("none"))
    );

    let download = app.export_tiff(None).await.unwrap();
    assert_eq!(download.file_name, "area.tif");
}
