//! geocanvas CLI: drive the map client engine from the command line

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geocanvas_client::{
    AppController, ClientOptions, ContextEnrichment, HeadlessRenderer, LogLevel, MapContext,
    MemoryToolkit, PollPolicy, UploadJobCoordinator, UploadLimits, UploadSource,
};
use geocanvas_cloud::{
    CachedGeocoder, ObjectKeys, OpenCageClient, OpenWeatherClient, ProcessingApi, ServiceClient,
    ServiceClientOptions,
};
use geocanvas_core::paint::project;
use geocanvas_core::vector::{export_geojson, import_geojson};
use geocanvas_core::{LngLat, StyleState};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Map, Value};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const GEOCODE_CACHE_SIZE: usize = 256;

#[derive(Parser)]
#[command(name = "geocanvas")]
#[command(author, version, about = "geocanvas map client - uploads, styling and vector tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the remote object keys derived for an upload
    Keys {
        /// Job identifier
        uuid: String,
        /// Original file name
        file_name: String,
    },
    /// Upload a GeoTIFF, wait for processing and report the results
    Upload {
        /// Local GeoTIFF to upload
        input: Option<PathBuf>,
        /// Fetch the image from a URL instead of a local file
        #[arg(long, conflicts_with = "input")]
        url: Option<String>,
        /// Processing service base URL
        #[arg(long, env = "GEOCANVAS_SERVICE_URL")]
        service_url: String,
        /// Run land-cover classification after the upload is displayed
        #[arg(long)]
        classify: bool,
        /// Download the resulting GeoTIFF into this directory
        #[arg(long)]
        export_tiff: Option<PathBuf>,
        /// Your latitude, for the distance report
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Your longitude, for the distance report
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
        /// OpenWeatherMap API key
        #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
        openweather_key: Option<String>,
        /// OpenCage API key
        #[arg(long, env = "OPENCAGE_API_KEY", hide_env_values = true)]
        opencage_key: Option<String>,
        /// Seconds between processing polls
        #[arg(long, default_value = "2.0")]
        poll_interval: f64,
        /// Maximum upload size in MiB
        #[arg(long, default_value = "200")]
        max_size_mib: u64,
    },
    /// Great-circle distance between two points, in kilometres
    Distance {
        #[arg(allow_hyphen_values = true)]
        lat1: f64,
        #[arg(allow_hyphen_values = true)]
        lon1: f64,
        #[arg(allow_hyphen_values = true)]
        lat2: f64,
        #[arg(allow_hyphen_values = true)]
        lon2: f64,
    },
    /// Print the paint expressions a GeoJSON file would compile to
    Paint {
        /// Input GeoJSON file
        input: PathBuf,
        /// Default fill colour
        #[arg(long, default_value = "#000000")]
        fill_color: String,
        /// Default stroke colour
        #[arg(long, default_value = "#000000")]
        stroke_color: String,
        /// Default stroke width
        #[arg(long, default_value = "2.0")]
        stroke_width: f64,
        /// Default fill opacity
        #[arg(long, default_value = "0.5")]
        fill_opacity: f64,
    },
    /// Rewrite a GeoJSON file in EPSG:4326
    Reproject {
        /// Input GeoJSON file
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    // A second subscriber only happens in tests; keep the first one.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn level_tag(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "info",
        LogLevel::Warning => "warn",
        LogLevel::Error => "error",
        LogLevel::Success => "ok",
    }
}

fn style_defaults(
    fill_color: &str,
    stroke_color: &str,
    stroke_width: f64,
    fill_opacity: f64,
) -> Result<StyleState> {
    let mut style = StyleState::default();
    style.set_fill_color(fill_color.parse().context("Invalid fill colour")?);
    style.set_stroke_color(stroke_color.parse().context("Invalid stroke colour")?);
    style
        .set_stroke_width(stroke_width)
        .context("Invalid stroke width")?;
    style
        .set_fill_opacity(fill_opacity)
        .context("Invalid fill opacity")?;
    Ok(style)
}

/// Paint writes grouped by layer id.
fn paint_plan_json(text: &str, style: &StyleState) -> Result<Value> {
    let imported = import_geojson(text).context("Failed to parse GeoJSON")?;
    let plan = project(imported.features.iter(), style);
    let mut layers = Map::new();
    for layer in plan.layers() {
        let mut paint = Map::new();
        for write in plan.for_layer(layer) {
            paint.insert(write.property.name().to_string(), write.expression.to_json());
        }
        layers.insert(layer.id().to_string(), Value::Object(paint));
    }
    Ok(json!({
        "features": imported.features.len(),
        "skipped": imported.skipped,
        "layers": layers,
    }))
}

fn reproject_file(input: &Path, output: &Path) -> Result<usize> {
    let imported = import_geojson(&read_text(input)?).context("Failed to parse GeoJSON")?;
    if imported.was_reprojected() {
        info!("Reprojected from {}", imported.source_crs);
    }
    let text = export_geojson(&imported.features).context("Failed to encode GeoJSON")?;
    std::fs::write(output, text)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(imported.features.len())
}

struct UploadArgs {
    input: Option<PathBuf>,
    url: Option<String>,
    service_url: String,
    classify: bool,
    export_tiff: Option<PathBuf>,
    location: Option<LngLat>,
    openweather_key: Option<String>,
    opencage_key: Option<String>,
    options: ClientOptions,
}

async fn run_upload(args: UploadArgs) -> Result<()> {
    let http = ServiceClientOptions::default();
    let api = ServiceClient::new(&args.service_url, http.clone())
        .context("Failed to create service client")?;
    let weather = args
        .openweather_key
        .map(|key| OpenWeatherClient::new(key, &http))
        .transpose()
        .context("Failed to create weather client")?;
    let geocoder = args
        .opencage_key
        .map(|key| OpenCageClient::new(key, &http))
        .transpose()
        .context("Failed to create geocoding client")?
        .map(|client| CachedGeocoder::new(client, GEOCODE_CACHE_SIZE));

    let source = match (args.input, args.url) {
        (Some(path), _) => {
            let bytes =
                std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.tif".to_string());
            Some(UploadSource::file(name, bytes))
        }
        (None, Some(url)) => Some(UploadSource::Url(url)),
        (None, None) => None,
    };

    let app = AppController::new(
        MapContext::new(HeadlessRenderer::loaded()),
        MemoryToolkit::new(),
        UploadJobCoordinator::new(api),
        ContextEnrichment::new(weather, geocoder),
        args.options,
    );
    app.on_style_loaded();
    app.set_user_location(args.location);

    let start = Instant::now();
    let outcome = run_jobs(&app, source, args.classify, args.export_tiff.as_deref()).await;

    for entry in app.context().results().entries() {
        println!("[{}] {}", level_tag(entry.level), entry.message);
    }
    for layer in app.context().registry().entries() {
        println!(
            "layer {} ({}) visible={} opacity={:.2}",
            layer.layer_id, layer.label, layer.visible, layer.opacity
        );
    }
    println!("  Processing time: {:.2?}", start.elapsed());
    outcome
}

type CliApp = AppController<
    HeadlessRenderer,
    MemoryToolkit,
    ServiceClient,
    OpenWeatherClient,
    CachedGeocoder<OpenCageClient>,
    geocanvas_client::TokioClock,
    geocanvas_client::UuidSource,
>;

async fn run_jobs(
    app: &CliApp,
    source: Option<UploadSource>,
    classify: bool,
    export_dir: Option<&Path>,
) -> Result<()> {
    let pb = spinner("Uploading and waiting for conversion...")?;
    let shown = app.upload(source).await;
    pb.finish_and_clear();
    let shown = shown.context("Upload failed")?;
    info!("Displayed {} as {}", shown.uuid, shown.layer_id);

    if classify {
        let pb = spinner("Classifying...")?;
        let classified = app.classify(Some(&shown.uuid)).await;
        pb.finish_and_clear();
        let classified = classified.context("Classification failed")?;
        info!("Classified layer {}", classified.layer_id);
    }

    if let Some(dir) = export_dir {
        let download = app
            .export_tiff(Some(&shown.uuid))
            .await
            .context("Export failed")?;
        let pb = spinner("Downloading GeoTIFF...")?;
        let object = app.uploads().api().fetch(&download.url).await;
        pb.finish_and_clear();
        let object = object.context("Download failed")?;
        let path = dir.join(&download.file_name);
        std::fs::write(&path, &object.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("GeoTIFF saved to: {}", path.display());
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Keys { uuid, file_name } => {
            let keys = ObjectKeys::derive(&uuid, &file_name);
            println!("{}", serde_json::to_string_pretty(&keys)?);
        }

        Commands::Upload {
            input,
            url,
            service_url,
            classify,
            export_tiff,
            lat,
            lon,
            openweather_key,
            opencage_key,
            poll_interval,
            max_size_mib,
        } => {
            if !(poll_interval.is_finite() && poll_interval > 0.0) {
                bail!("--poll-interval must be a positive number of seconds");
            }
            let options = ClientOptions {
                poll: PollPolicy {
                    interval: std::time::Duration::from_secs_f64(poll_interval),
                    ..PollPolicy::default()
                },
                limits: UploadLimits {
                    max_bytes: max_size_mib.saturating_mul(1024 * 1024),
                },
            };
            let location = match (lat, lon) {
                (Some(lat), Some(lon)) => Some(LngLat::new(lon, lat)),
                _ => None,
            };
            let args = UploadArgs {
                input,
                url,
                service_url,
                classify,
                export_tiff,
                location,
                openweather_key,
                opencage_key,
                options,
            };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(run_upload(args))?;
        }

        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => {
            let km = LngLat::new(lon1, lat1).distance_km(&LngLat::new(lon2, lat2));
            println!("{:.2} km", km);
        }

        Commands::Paint {
            input,
            fill_color,
            stroke_color,
            stroke_width,
            fill_opacity,
        } => {
            let style = style_defaults(&fill_color, &stroke_color, stroke_width, fill_opacity)?;
            let plan = paint_plan_json(&read_text(&input)?, &style)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        Commands::Reproject { input, output } => {
            let start = Instant::now();
            let count = reproject_file(&input, &output)?;
            info!("Wrote {} feature(s)", count);
            done("GeoJSON", &output, start.elapsed());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r##"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "id": "a",
            "properties": {"strokeColor": "#ff0000"},
            "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}
        }]
    }"##;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn paint_plan_lists_stored_colours() {
        let style = style_defaults("#000", "#000", 2.0, 0.5).unwrap();
        let plan = paint_plan_json(LINE, &style).unwrap();
        assert_eq!(plan["features"], json!(1));
        assert_eq!(
            plan["layers"]["gl-draw-line-inactive"]["line-color"],
            json!(["match", ["get", "id"], "a", "#ff0000", "#000000"])
        );
    }

    #[test]
    fn invalid_defaults_are_rejected() {
        assert!(style_defaults("red", "#000", 2.0, 0.5).is_err());
        assert!(style_defaults("#000", "#000", 2.0, 3.0).is_err());
    }

    #[test]
    fn reproject_writes_a_collection() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.geojson");
        let output = dir.path().join("out.geojson");
        std::fs::write(&input, LINE).unwrap();

        assert_eq!(reproject_file(&input, &output).unwrap(), 1);
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(doc["type"], json!("FeatureCollection"));
        assert_eq!(doc["features"][0]["properties"]["strokeColor"], json!("#ff0000"));
    }
}
