//! Upload job scenarios against a scripted processing service.

mod common;

use std::time::Duration;

use common::{area_bounds, image, ManualClock, ScriptedApi, SequentialIds};
use geocanvas_client::{
    HeadlessRenderer, JobError, JobStage, LogLevel, MapContext, MapRenderer, UploadJobCoordinator,
    UploadLimits, UploadSource,
};
use geocanvas_cloud::FetchedObject;
use geocanvas_core::Bounds;
use serde_json::json;

type Coordinator = UploadJobCoordinator<ScriptedApi, ManualClock, SequentialIds>;

fn coordinator(api: ScriptedApi) -> Coordinator {
    UploadJobCoordinator::with_parts(api, ManualClock::default(), SequentialIds::default())
}

fn tiff(name: &str) -> Option<UploadSource> {
    Some(UploadSource::file(name, vec![0u8; 1024]))
}

#[tokio::test]
async fn upload_displays_image_once_ready() {
    let api = ScriptedApi::new().ready_on(
        "png-export/job-1_area.png",
        2,
        image("https://bucket.example/area.png", area_bounds()),
    );
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let shown = jobs.upload(&ctx, tiff("area.tif")).await.unwrap();

    assert_eq!(shown.uuid, "job-1");
    assert_eq!(jobs.api().polls_of("png-export/job-1_area.png"), 2);
    assert_eq!(jobs.api().uploads.borrow()[0].2, "image/tiff");
    assert!(jobs.api().uploads.borrow()[0]
        .0
        .contains("tiff-uploads/job-1_area.tif"));

    let renderer = ctx.renderer();
    assert_eq!(renderer.layer_ids(), vec![shown.layer_id.as_str()]);
    assert_eq!(renderer.paint(&shown.layer_id, "raster-opacity"), Some(&json!(0.85)));
    assert_eq!(renderer.last_fit(), Some(area_bounds()));
    drop(renderer);

    let entries = ctx.registry().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].label, "area.tif");

    let job = jobs.job("job-1").unwrap();
    assert_eq!(job.stage, JobStage::Displayed);
    assert_eq!(job.raster_layer.as_deref(), Some(shown.layer_id.as_str()));
}

#[tokio::test]
async fn conversion_times_out_after_thirty_attempts() {
    let jobs = coordinator(ScriptedApi::new());
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let err = jobs.upload(&ctx, tiff("area.tif")).await.unwrap_err();

    assert!(matches!(err, JobError::TimedOut { attempts: 30 }));
    assert_eq!(jobs.api().polls_of("png-export/job-1_area.png"), 30);
    assert_eq!(jobs.job("job-1").map(|j| j.stage), Some(JobStage::TimedOut));
    assert!(ctx.renderer().layer_ids().is_empty());
    assert!(ctx.results().contains("timed out after 30 attempts"));
}

#[tokio::test]
async fn poll_waits_one_interval_per_attempt() {
    let api = ScriptedApi::new().ready_on(
        "png-export/job-1_area.png",
        3,
        image("u", area_bounds()),
    );
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());
    jobs.upload(&ctx, tiff("area.tif")).await.unwrap();

    assert_eq!(jobs.clock().sleeps.get(), 3);
    assert_eq!(jobs.clock().slept.get(), Duration::from_secs(6));
}

#[tokio::test]
async fn missing_input_is_reported() {
    let jobs = coordinator(ScriptedApi::new());
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    assert!(matches!(jobs.upload(&ctx, None).await, Err(JobError::NoInput)));
    assert_eq!(ctx.results().count(LogLevel::Error), 1);
    assert!(jobs.jobs().is_empty());
}

#[tokio::test]
async fn oversized_files_are_refused() {
    let jobs = coordinator(ScriptedApi::new()).with_limits(UploadLimits { max_bytes: 100 });
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let err = jobs.upload(&ctx, tiff("big.tif")).await.unwrap_err();
    assert!(matches!(err, JobError::FileTooLarge { size: 1024, limit: 100 }));
    assert!(jobs.api().uploads.borrow().is_empty());
}

#[tokio::test]
async fn upload_http_failure_is_not_retried() {
    let api = ScriptedApi {
        put_status: Some(403),
        ..ScriptedApi::new()
    };
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let err = jobs.upload(&ctx, tiff("area.tif")).await.unwrap_err();
    assert!(matches!(err, JobError::Remote(_)));
    assert_eq!(jobs.job("job-1").map(|j| j.stage), Some(JobStage::Failed));
    assert!(ctx.results().contains("Upload failed: HTTP 403 Forbidden"));
    assert_eq!(jobs.api().polls_of("png-export/job-1_area.png"), 0);
}

#[tokio::test]
async fn transport_error_while_polling_fails_the_job() {
    let api = ScriptedApi {
        broken_poll: true,
        ..ScriptedApi::new()
    };
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let err = jobs.upload(&ctx, tiff("area.tif")).await.unwrap_err();
    assert!(matches!(err, JobError::Remote(_)));
    assert_eq!(jobs.job("job-1").map(|j| j.stage), Some(JobStage::Failed));
}

#[tokio::test]
async fn url_reference_is_fetched_then_uploaded() {
    let api = ScriptedApi {
        fetch_result: Some(FetchedObject {
            bytes: vec![1, 2, 3],
            content_type: Some("image/tiff".into()),
        }),
        ..ScriptedApi::new()
    }
    .ready_on("png-export/job-1_scene.png", 1, image("u", area_bounds()));
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let source = Some(UploadSource::Url(
        "https://data.example/scenes/scene.tif?token=x".into(),
    ));
    jobs.upload(&ctx, source).await.unwrap();

    let job = jobs.job("job-1").unwrap();
    assert_eq!(job.original_file_name, "scene.tif");
    assert_eq!(jobs.api().uploads.borrow()[0].1, 3);
}

#[tokio::test]
async fn classification_adds_a_second_layer() {
    let api = ScriptedApi::new()
        .ready_on("png-export/job-1_area.png", 1, image("png", area_bounds()))
        .ready_on(
            "segment-upload/job-1_area_classified.png",
            4,
            image("classified", area_bounds()),
        );
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let shown = jobs.upload(&ctx, tiff("area.tif")).await.unwrap();
    let classified = jobs.classify(&ctx, Some(&shown.uuid)).await.unwrap();

    assert_ne!(shown.layer_id, classified.layer_id);
    assert_eq!(
        jobs.api().segmentations.borrow().as_slice(),
        ["tiff-uploads/job-1_area.tif"]
    );
    assert_eq!(ctx.renderer().layer_ids().len(), 2);
    assert_eq!(jobs.job("job-1").map(|j| j.stage), Some(JobStage::Classified));

    let labels: Vec<String> = ctx.registry().entries().into_iter().map(|e| e.label).collect();
    assert_eq!(labels, vec!["area_classified.png", "area.tif"]);
}

#[tokio::test]
async fn classification_without_upload_is_refused() {
    let jobs = coordinator(ScriptedApi::new());
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    assert!(matches!(
        jobs.classify(&ctx, None).await,
        Err(JobError::NoUploadToClassify)
    ));
    assert!(ctx.results().contains("Please upload an image before classifying."));
    assert!(jobs.api().segmentations.borrow().is_empty());
}

#[tokio::test]
async fn overlapping_classification_of_one_job_runs_once() {
    let api = ScriptedApi {
        slow_segmentation: true,
        ..ScriptedApi::new()
            .ready_on("png-export/job-1_area.png", 1, image("png", area_bounds()))
            .ready_on(
                "segment-upload/job-1_area_classified.png",
                1,
                image("classified", area_bounds()),
            )
    };
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());
    jobs.upload(&ctx, tiff("area.tif")).await.unwrap();

    let (first, second) = futures::join!(
        jobs.classify(&ctx, Some("job-1")),
        jobs.classify(&ctx, Some("job-1"))
    );

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(JobError::WrongStage {
            stage: JobStage::AwaitingClassification,
            expected: JobStage::Displayed,
            ..
        })
    ));
    assert_eq!(jobs.api().segmentations.borrow().len(), 1);
    assert_eq!(ctx.renderer().layer_ids().len(), 2);
    assert_eq!(jobs.job("job-1").map(|j| j.stage), Some(JobStage::Classified));
}

#[tokio::test]
async fn export_without_upload_is_refused() {
    let jobs = coordinator(ScriptedApi::new());
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    assert!(matches!(
        jobs.export_tiff(&ctx, None).await,
        Err(JobError::NoUploadToExport)
    ));
    assert!(ctx.results().contains("Please upload an image before exporting."));
    assert!(jobs.api().exports.borrow().is_empty());
}

#[tokio::test]
async fn classification_times_out_after_120_attempts() {
    let api = ScriptedApi::new().ready_on("png-export/job-1_area.png", 1, image("u", area_bounds()));
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    jobs.upload(&ctx, tiff("area.tif")).await.unwrap();
    let err = jobs.classify(&ctx, Some("job-1")).await.unwrap_err();
    assert!(matches!(err, JobError::TimedOut { attempts: 120 }));
    assert_eq!(
        jobs.api().polls_of("segment-upload/job-1_area_classified.png"),
        120
    );
}

#[tokio::test]
async fn export_prefers_classified_key() {
    let api = ScriptedApi::new()
        .ready_on("png-export/job-1_area.png", 1, image("png", area_bounds()))
        .ready_on("segment-upload/job-1_area_classified.png", 1, image("c", area_bounds()));
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    jobs.upload(&ctx, tiff("area.tif")).await.unwrap();
    let plain = jobs.export_tiff(&ctx, Some("job-1")).await.unwrap();
    assert_eq!(plain.file_name, "area.tif");

    jobs.classify(&ctx, Some("job-1")).await.unwrap();
    let classified = jobs.export_tiff(&ctx, Some("job-1")).await.unwrap();
    assert_eq!(classified.file_name, "area_classified.tif");

    assert_eq!(
        jobs.api().exports.borrow().as_slice(),
        [
            "tiff-uploads/job-1_area.tif",
            "segment-upload/job-1_area_classified.png"
        ]
    );
}

#[tokio::test]
async fn concurrent_jobs_bind_to_their_own_layers() {
    let north = Bounds::new(60.0, 10.0, 59.0, 11.0);
    let south = Bounds::new(-33.0, 18.0, -34.0, 19.0);
    let api = ScriptedApi::new()
        .ready_on("png-export/job-1_north.png", 3, image("north.png", north))
        .ready_on("png-export/job-2_south.png", 1, image("south.png", south));
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let (a, b) = futures::join!(
        jobs.upload(&ctx, tiff("north.tif")),
        jobs.upload(&ctx, tiff("south.tif"))
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.info.bounds, north);
    assert_eq!(b.info.bounds, south);
    let registry = ctx.registry();
    assert_eq!(registry.get(&a.layer_id).map(|r| r.bounds), Some(north));
    assert_eq!(registry.get(&b.layer_id).map(|r| r.bounds), Some(south));
    assert_eq!(
        registry.get(&a.layer_id).and_then(|r| r.upload_uuid.clone()),
        Some("job-1".to_string())
    );
}

#[tokio::test]
async fn cancellation_stops_polling() {
    let jobs = coordinator(ScriptedApi::new());
    let ctx = MapContext::new(HeadlessRenderer::loaded());

    let upload = jobs.upload(&ctx, tiff("area.tif"));
    let cancel = async {
        // Let the upload reach its polling loop first.
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert!(jobs.cancel("job-1"));
    };
    let (result, ()) = futures::join!(upload, cancel);

    assert!(matches!(result, Err(JobError::Cancelled)));
    assert_eq!(jobs.job("job-1").map(|j| j.stage), Some(JobStage::Cancelled));
    assert!(jobs.api().polls_of("png-export/job-1_area.png") < 30);
    assert!(!jobs.cancel("job-1"));
}

#[tokio::test]
async fn display_before_style_load_is_deferred() {
    let api = ScriptedApi::new().ready_on("png-export/job-1_area.png", 1, image("u", area_bounds()));
    let jobs = coordinator(api);
    let ctx = MapContext::new(HeadlessRenderer::default());

    let shown = jobs.upload(&ctx, tiff("area.tif")).await.unwrap();
    assert!(ctx.renderer().layer_ids().is_empty());
    assert_eq!(ctx.registry().pending_len(), 1);

    ctx.renderer_mut().finish_loading();
    let added = ctx.with_layers(|registry, renderer| registry.on_style_loaded(renderer));
    assert_eq!(added, 1);
    assert!(ctx.renderer().has_layer(&shown.layer_id));
}
