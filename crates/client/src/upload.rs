//! Upload / processing jobs: upload a raster, poll for the reprojected
//! PNG, display it, optionally classify it, and re-export to GeoTIFF.
//!
//! Every job is keyed by its uuid, so several can be in flight at once on
//! the same single-threaded executor.

#![allow(async_fn_in_trait)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use geocanvas_cloud::keys::{display_name, file_name_from_url};
use geocanvas_cloud::{ImageInfo, ObjectKeys, ProcessingApi};
use tracing::{debug, info, warn};

use crate::context::MapContext;
use crate::error::{JobError, JobResult};
use crate::registry::NewRasterLayer;
use crate::renderer::MapRenderer;
use crate::results::LogEntry;

/// Where a job is in its lifecycle. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStage {
    Uploading,
    AwaitingConversion,
    Displayed,
    AwaitingClassification,
    Classified,
    TimedOut,
    Failed,
    Cancelled,
}

impl JobStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Classified | Self::TimedOut | Self::Failed | Self::Cancelled
        )
    }
}

/// Polling cadence for the two processing stages.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub conversion_attempts: u32,
    pub classification_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            conversion_attempts: 30,
            classification_attempts: 120,
        }
    }
}

/// Upload size limit.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 200 * 1024 * 1024,
        }
    }
}

/// Waits between poll attempts.
pub trait PollClock {
    async fn sleep(&self, duration: Duration);
}

/// Real time, via the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl PollClock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Source of job ids.
pub trait IdSource {
    fn next_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Cooperative cancellation flag shared between a job and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// What to upload.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// A local file's contents.
    File {
        name: String,
        bytes: Vec<u8>,
        content_type: String,
    },
    /// A file referenced by URL; it is downloaded first.
    Url(String),
}

impl UploadSource {
    pub fn file(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = content_type_for(&name).to_string();
        Self::File {
            name,
            bytes,
            content_type,
        }
    }
}

/// One upload and everything derived from it.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub uuid: String,
    pub keys: ObjectKeys,
    pub original_file_name: String,
    pub stage: JobStage,
    /// Layer showing the reprojected upload.
    pub raster_layer: Option<String>,
    /// Layer showing the classification result.
    pub classified_layer: Option<String>,
    cancel: CancellationToken,
}

impl UploadJob {
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// A processed image now on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedImage {
    pub uuid: String,
    pub layer_id: String,
    pub info: ImageInfo,
}

/// A GeoTIFF ready for download.
#[derive(Debug, Clone, PartialEq)]
pub struct TiffDownload {
    pub url: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Copy)]
enum PollTarget {
    Conversion,
    Classification,
}

pub struct UploadJobCoordinator<P, C = TokioClock, I = UuidSource> {
    api: P,
    clock: C,
    ids: I,
    policy: PollPolicy,
    limits: UploadLimits,
    /// Jobs in creation order.
    jobs: RefCell<Vec<UploadJob>>,
}

impl<P: ProcessingApi> UploadJobCoordinator<P> {
    pub fn new(api: P) -> Self {
        Self::with_parts(api, TokioClock, UuidSource)
    }
}

impl<P, C, I> UploadJobCoordinator<P, C, I>
where
    P: ProcessingApi,
    C: PollClock,
    I: IdSource,
{
    pub fn with_parts(api: P, clock: C, ids: I) -> Self {
        Self {
            api,
            clock,
            ids,
            policy: PollPolicy::default(),
            limits: UploadLimits::default(),
            jobs: RefCell::new(Vec::new()),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn api(&self) -> &P {
        &self.api
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Snapshot of every job, oldest first.
    pub fn jobs(&self) -> Vec<UploadJob> {
        self.jobs.borrow().clone()
    }

    pub fn job(&self, uuid: &str) -> Option<UploadJob> {
        self.jobs.borrow().iter().find(|j| j.uuid == uuid).cloned()
    }

    /// Most recently started job.
    pub fn latest(&self) -> Option<UploadJob> {
        self.jobs.borrow().last().cloned()
    }

    /// Request cancellation; the job stops before its next poll attempt.
    pub fn cancel(&self, uuid: &str) -> bool {
        match self.jobs.borrow().iter().find(|j| j.uuid == uuid) {
            Some(job) if !job.stage.is_terminal() => {
                job.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Upload a file, wait for the reprojected PNG and display it.
    pub async fn upload<R: MapRenderer>(
        &self,
        ctx: &MapContext<R>,
        source: Option<UploadSource>,
    ) -> JobResult<DisplayedImage> {
        let Some(source) = source else {
            ctx.report(LogEntry::error("Please select a file or enter a URL to upload."));
            return Err(JobError::NoInput);
        };

        let (name, bytes, content_type) = match source {
            UploadSource::File {
                name,
                bytes,
                content_type,
            } => (name, bytes, content_type),
            UploadSource::Url(url) => {
                let name = file_name_from_url(&url).unwrap_or_else(|| "upload.tif".into());
                ctx.report(LogEntry::info(format!("Fetching {url}...")));
                let fetched = self.api.fetch(&url).await.map_err(|e| {
                    ctx.report(LogEntry::error(format!("Could not fetch {url}: {e}")));
                    JobError::from(e)
                })?;
                let content_type = fetched
                    .content_type
                    .unwrap_or_else(|| content_type_for(&name).to_string());
                (name, fetched.bytes, content_type)
            }
        };

        let size = bytes.len() as u64;
        if size > self.limits.max_bytes {
            ctx.report(LogEntry::error(format!(
                "{name} is too large ({} MiB, limit {} MiB).",
                size / (1024 * 1024),
                self.limits.max_bytes / (1024 * 1024)
            )));
            return Err(JobError::FileTooLarge {
                size,
                limit: self.limits.max_bytes,
            });
        }

        let uuid = self.ids.next_id();
        let keys = ObjectKeys::derive(&uuid, &name);
        self.jobs.borrow_mut().push(UploadJob {
            uuid: uuid.clone(),
            keys: keys.clone(),
            original_file_name: name.clone(),
            stage: JobStage::Uploading,
            raster_layer: None,
            classified_layer: None,
            cancel: CancellationToken::new(),
        });
        info!(%uuid, file = %name, size, "upload started");
        ctx.report(LogEntry::info(format!("Uploading {name}...")));

        if let Err(e) = self.put(&keys.tiff_key, bytes, &content_type).await {
            self.set_stage(&uuid, JobStage::Failed);
            ctx.report(LogEntry::error(format!("Upload failed: {e}")));
            return Err(e.into());
        }

        self.set_stage(&uuid, JobStage::AwaitingConversion);
        ctx.report(LogEntry::info(format!("{name} uploaded, processing...")));

        let info = self
            .poll(ctx, &uuid, PollTarget::Conversion, &keys.png_export_key)
            .await?;

        let layer_id = display(ctx, &uuid, &info, &keys.tiff_key, name.clone());
        self.update(&uuid, |job| job.raster_layer = Some(layer_id.clone()));
        self.set_stage(&uuid, JobStage::Displayed);
        ctx.report(LogEntry::success(format!("{name} is on the map.")));

        Ok(DisplayedImage {
            uuid,
            layer_id,
            info,
        })
    }

    /// Classify a displayed upload and show the result as a second layer.
    pub async fn classify<R: MapRenderer>(
        &self,
        ctx: &MapContext<R>,
        uuid: Option<&str>,
    ) -> JobResult<DisplayedImage> {
        let Some(job) = uuid.and_then(|u| self.job(u)) else {
            ctx.report(LogEntry::error("Please upload an image before classifying."));
            return Err(JobError::NoUploadToClassify);
        };
        if job.stage != JobStage::Displayed {
            ctx.report(LogEntry::error(format!(
                "{} cannot be classified right now.",
                job.original_file_name
            )));
            return Err(JobError::WrongStage {
                uuid: job.uuid,
                stage: job.stage,
                expected: JobStage::Displayed,
            });
        }
        let uuid = job.uuid.as_str();

        // Claim the job before the first suspension point so an overlapping
        // call sees `AwaitingClassification`.
        self.set_stage(uuid, JobStage::AwaitingClassification);
        ctx.report(LogEntry::info(format!(
            "Classifying {}...",
            job.original_file_name
        )));
        if let Err(e) = self.api.invoke_segmentation(&job.keys.tiff_key).await {
            self.set_stage(uuid, JobStage::Failed);
            ctx.report(LogEntry::error(format!("Classification failed: {e}")));
            return Err(e.into());
        }

        let segment_key = &job.keys.segment_upload_key;
        let info = self
            .poll(ctx, uuid, PollTarget::Classification, segment_key)
            .await?;

        let label = display_name(segment_key, uuid);
        let layer_id = display(ctx, uuid, &info, segment_key, label);
        self.update(uuid, |j| j.classified_layer = Some(layer_id.clone()));
        self.set_stage(uuid, JobStage::Classified);
        ctx.report(LogEntry::success("Classification complete."));

        Ok(DisplayedImage {
            uuid: uuid.to_string(),
            layer_id,
            info,
        })
    }

    /// Convert a job's image to GeoTIFF: the classification result when
    /// there is one, else the original upload.
    pub async fn export_tiff<R: MapRenderer>(
        &self,
        ctx: &MapContext<R>,
        uuid: Option<&str>,
    ) -> JobResult<TiffDownload> {
        let Some(job) = uuid.and_then(|u| self.job(u)) else {
            ctx.report(LogEntry::error("Please upload an image before exporting."));
            return Err(JobError::NoUploadToExport);
        };

        let (key, file_name) = if job.classified_layer.is_some() {
            (
                job.keys.segment_upload_key.as_str(),
                display_name(&job.keys.segment_tiff_key, &job.uuid),
            )
        } else {
            (job.keys.tiff_key.as_str(), job.original_file_name.clone())
        };

        debug!(uuid = %job.uuid, key, "requesting GeoTIFF export");
        let url = self.api.export_tiff(key).await.map_err(|e| {
            ctx.report(LogEntry::error(format!("Export failed: {e}")));
            JobError::from(e)
        })?;
        ctx.report(LogEntry::success(format!("{file_name} is ready to download.")));
        Ok(TiffDownload { url, file_name })
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> geocanvas_cloud::Result<()> {
        let url = self.api.presign_upload(key).await?;
        self.api.put_object(&url, bytes, content_type).await
    }

    /// Poll until the image is ready, the attempts run out or the job is
    /// cancelled. Each attempt waits one interval first.
    async fn poll<R: MapRenderer>(
        &self,
        ctx: &MapContext<R>,
        uuid: &str,
        target: PollTarget,
        key: &str,
    ) -> JobResult<ImageInfo> {
        let attempts = match target {
            PollTarget::Conversion => self.policy.conversion_attempts,
            PollTarget::Classification => self.policy.classification_attempts,
        };
        let token = self
            .job(uuid)
            .map(|j| j.cancellation())
            .ok_or_else(|| JobError::UnknownJob(uuid.to_string()))?;

        for attempt in 1..=attempts {
            self.clock.sleep(self.policy.interval).await;
            if token.is_cancelled() {
                self.set_stage(uuid, JobStage::Cancelled);
                ctx.report(LogEntry::warning("Processing cancelled."));
                return Err(JobError::Cancelled);
            }

            let reply = match target {
                PollTarget::Conversion => self.api.processed_image_info(key).await,
                PollTarget::Classification => self.api.segmented_image_info(key).await,
            };
            match reply {
                Ok(Some(info)) => {
                    debug!(uuid, attempt, "image ready");
                    return Ok(info);
                }
                Ok(None) => debug!(uuid, attempt, attempts, "not ready"),
                Err(e) => {
                    warn!(uuid, attempt, error = %e, "poll failed");
                    self.set_stage(uuid, JobStage::Failed);
                    ctx.report(LogEntry::error(format!("Processing failed: {e}")));
                    return Err(e.into());
                }
            }
        }

        self.set_stage(uuid, JobStage::TimedOut);
        ctx.report(LogEntry::error(format!(
            "Processing timed out after {attempts} attempts. Please try again."
        )));
        Err(JobError::TimedOut { attempts })
    }

    fn update(&self, uuid: &str, f: impl FnOnce(&mut UploadJob)) {
        if let Some(job) = self.jobs.borrow_mut().iter_mut().find(|j| j.uuid == uuid) {
            f(job);
        }
    }

    /// Advance a job; moves backwards or out of a terminal stage are ignored.
    fn set_stage(&self, uuid: &str, stage: JobStage) {
        self.update(uuid, |job| {
            if job.stage.is_terminal() || stage <= job.stage {
                warn!(uuid, from = ?job.stage, to = ?stage, "stage change ignored");
                return;
            }
            debug!(uuid, from = ?job.stage, to = ?stage, "job stage");
            job.stage = stage;
        });
    }
}

/// Register a new overlay for `info`, put it on the map and fit to it.
fn display<R: MapRenderer>(
    ctx: &MapContext<R>,
    uuid: &str,
    info: &ImageInfo,
    object_key: &str,
    label: String,
) -> String {
    ctx.with_layers(|registry, renderer| {
        let layer_id = registry.register(NewRasterLayer {
            bounds: info.bounds,
            image_url: info.png_url.clone(),
            remote_object_key: Some(object_key.to_string()),
            display_name: label,
            upload_uuid: Some(uuid.to_string()),
        });
        registry.add_or_update_layer(renderer, &layer_id, info.bounds, &info.png_url);
        registry.fit_to_bounds(renderer, &layer_id);
        layer_id
    })
}

/// MIME type by extension; the processing service only needs TIFF right.
fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".tif") || lower.ends_with(".tiff") {
        "image/tiff"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(JobStage::Uploading < JobStage::AwaitingConversion);
        assert!(JobStage::Displayed < JobStage::Classified);
        assert!(JobStage::Classified.is_terminal());
        assert!(!JobStage::Displayed.is_terminal());
    }

    #[test]
    fn default_policy() {
        let p = PollPolicy::default();
        assert_eq!(p.interval, Duration::from_secs(2));
        assert_eq!(p.conversion_attempts, 30);
        assert_eq!(p.classification_attempts, 120);
        assert_eq!(UploadLimits::default().max_bytes, 209_715_200);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("area.TIF"), "image/tiff");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[test]
    fn cancellation_is_shared() {
        let token = CancellationToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }
}
