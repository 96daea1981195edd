//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use geocanvas_client::{IdSource, PollClock};
use geocanvas_cloud::{CloudError, FetchedObject, ImageInfo, ProcessingApi, Result};
use geocanvas_core::Bounds;

/// Processing service whose images become ready after a set number of
/// polls.
#[derive(Default)]
pub struct ScriptedApi {
    /// object key -> (poll number that succeeds, image)
    pub ready: HashMap<String, (u32, ImageInfo)>,
    pub polls: RefCell<HashMap<String, u32>>,
    pub put_status: Option<u16>,
    pub broken_poll: bool,
    /// Yield to the executor before acknowledging a segmentation request.
    pub slow_segmentation: bool,
    pub fetch_result: Option<FetchedObject>,
    pub uploads: RefCell<Vec<(String, usize, String)>>,
    pub segmentations: RefCell<Vec<String>>,
    pub exports: RefCell<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `key` ready on poll number `on_poll` (1-based).
    pub fn ready_on(mut self, key: &str, on_poll: u32, info: ImageInfo) -> Self {
        self.ready.insert(key.to_string(), (on_poll, info));
        self
    }

    pub fn polls_of(&self, key: &str) -> u32 {
        self.polls.borrow().get(key).copied().unwrap_or(0)
    }

    fn poll(&self, key: &str) -> Result<Option<ImageInfo>> {
        if self.broken_poll {
            return Err(CloudError::Network("connection reset".into()));
        }
        let n = {
            let mut polls = self.polls.borrow_mut();
            let n = polls.entry(key.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        Ok(match self.ready.get(key) {
            Some((on_poll, info)) if n >= *on_poll => Some(info.clone()),
            _ => None,
        })
    }
}

impl ProcessingApi for ScriptedApi {
    async fn presign_upload(&self, object_key: &str) -> Result<String> {
        Ok(format!("https://bucket.example/{object_key}?sig=abc"))
    }

    async fn put_object(&self, url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        if let Some(status) = self.put_status {
            return Err(CloudError::Status {
                status,
                reason: "Forbidden".into(),
            });
        }
        self.uploads
            .borrow_mut()
            .push((url.to_string(), bytes.len(), content_type.to_string()));
        Ok(())
    }

    async fn processed_image_info(&self, png_key: &str) -> Result<Option<ImageInfo>> {
        self.poll(png_key)
    }

    async fn invoke_segmentation(&self, image_key: &str) -> Result<()> {
        if self.slow_segmentation {
            tokio::task::yield_now().await;
        }
        self.segmentations.borrow_mut().push(image_key.to_string());
        Ok(())
    }

    async fn segmented_image_info(&self, segment_key: &str) -> Result<Option<ImageInfo>> {
        self.poll(segment_key)
    }

    async fn export_tiff(&self, object_key: &str) -> Result<String> {
        self.exports.borrow_mut().push(object_key.to_string());
        Ok(format!("https://bucket.example/{object_key}.tif"))
    }

    async fn fetch(&self, url: &str) -> Result<FetchedObject> {
        self.fetch_result
            .clone()
            .ok_or_else(|| CloudError::Network(format!("cannot reach {url}")))
    }
}

/// Clock that records requested sleeps and only yields to the executor.
#[derive(Default)]
pub struct ManualClock {
    pub sleeps: Cell<u32>,
    pub slept: Cell<Duration>,
}

impl PollClock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
        self.slept.set(self.slept.get() + duration);
        tokio::task::yield_now().await;
    }
}

/// Ids `job-1`, `job-2`, ...
#[derive(Default)]
pub struct SequentialIds(Cell<u32>);

impl IdSource for SequentialIds {
    fn next_id(&self) -> String {
        self.0.set(self.0.get() + 1);
        format!("job-{}", self.0.get())
    }
}

pub fn area_bounds() -> Bounds {
    Bounds::new(10.0, 20.0, 9.0, 21.0)
}

pub fn image(url: &str, bounds: Bounds) -> ImageInfo {
    ImageInfo {
        png_url: url.to_string(),
        bounds,
    }
}
