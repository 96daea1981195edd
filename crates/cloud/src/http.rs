//! HTTP client for the upload / processing service.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ProcessingApi;
use crate::error::{CloudError, Result};
use crate::models::{
    ExportRequest, FetchedObject, ImageInfo, PresignedUrl, SegmentationRequest, ServiceReply,
    TiffExport,
};

/// Configuration shared by every HTTP collaborator.
#[derive(Debug, Clone)]
pub struct ServiceClientOptions {
    /// Per-request timeout (default 30 s).
    pub request_timeout: Duration,
    /// Retries on connect / timeout failures of idempotent GETs (default 2).
    /// Uploads and POSTs are never retried.
    pub max_retries: u32,
}

impl Default for ServiceClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

pub(crate) fn build_client(options: &ServiceClientOptions) -> Result<Client> {
    Client::builder()
        .timeout(options.request_timeout)
        .build()
        .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))
}

/// Client for the processing service REST endpoints.
pub struct ServiceClient {
    base_url: String,
    client: Client,
    options: ServiceClientOptions,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>, options: ServiceClientOptions) -> Result<Self> {
        let client = build_client(&options)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            options,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_reply<T: DeserializeOwned>(
        &self,
        path: &str,
        object_name: &str,
    ) -> Result<ServiceReply<T>> {
        let request = self
            .client
            .get(self.endpoint(path))
            .query(&[("object_name", object_name)]);
        let resp = self.execute_with_retry(request).await?;
        read_reply(resp).await
    }

    async fn post_reply<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ServiceReply<T>> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await?;
        read_reply(resp).await
    }

    /// Execute a request with exponential backoff on transient failures.
    async fn execute_with_retry(&self, request: RequestBuilder) -> Result<Response> {
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(250 * (1 << (attempt - 1)));
                tokio::time::sleep(delay).await;
            }

            let Some(cloned) = request.try_clone() else {
                return Ok(request.send().await?);
            };
            match cloned.send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(attempt, error = %e, "transient HTTP failure");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .map(CloudError::from)
            .unwrap_or_else(|| CloudError::Network("request failed".into())))
    }
}

/// Decode a service reply. An `{error}` body is a reply whatever the status
/// code; anything else on a non-2xx status is a transport-level failure.
async fn read_reply<T: DeserializeOwned>(resp: Response) -> Result<ServiceReply<T>> {
    let status = resp.status();
    let body = resp.text().await?;
    match serde_json::from_str::<ServiceReply<T>>(&body) {
        Ok(reply) => Ok(reply),
        Err(_) if !status.is_success() => Err(CloudError::status(status)),
        Err(e) => Err(CloudError::Parse(format!(
            "{e}: {}",
            body.chars().take(200).collect::<String>()
        ))),
    }
}

fn ready<T>(reply: ServiceReply<T>, key: &str) -> Option<T> {
    match reply {
        ServiceReply::Ok(v) => Some(v),
        ServiceReply::Error { error } => {
            debug!(key, %error, "result not ready");
            None
        }
    }
}

impl ProcessingApi for ServiceClient {
    async fn presign_upload(&self, object_key: &str) -> Result<String> {
        let reply: ServiceReply<PresignedUrl> =
            self.get_reply("generate-presigned-url", object_key).await?;
        Ok(reply.into_result()?.url)
    }

    async fn put_object(&self, url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let size = bytes.len();
        let resp = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CloudError::status(resp.status()));
        }
        debug!(size, "uploaded object");
        Ok(())
    }

    async fn processed_image_info(&self, png_key: &str) -> Result<Option<ImageInfo>> {
        let reply = self.get_reply("get-processed-image-info", png_key).await?;
        Ok(ready(reply, png_key))
    }

    async fn invoke_segmentation(&self, image_key: &str) -> Result<()> {
        let reply: ServiceReply<Value> = self
            .post_reply("invoke-segmentation", &SegmentationRequest { image_key })
            .await?;
        reply.into_result().map(|_| ())
    }

    async fn segmented_image_info(&self, segment_key: &str) -> Result<Option<ImageInfo>> {
        let reply = self.get_reply("get-segmented-image-info", segment_key).await?;
        Ok(ready(reply, segment_key))
    }

    async fn export_tiff(&self, object_key: &str) -> Result<String> {
        let reply: ServiceReply<TiffExport> = self
            .post_reply("export-tiff", &ExportRequest { s3_key: object_key })
            .await?;
        Ok(reply.into_result()?.tiff_url)
    }

    async fn fetch(&self, url: &str) -> Result<FetchedObject> {
        let resp = self.execute_with_retry(self.client.get(url)).await?;
        if !resp.status().is_success() {
            return Err(CloudError::status(resp.status()));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?.to_vec();
        Ok(FetchedObject {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_paths() {
        let client =
            ServiceClient::new("https://svc.example.com/", ServiceClientOptions::default()).unwrap();
        assert_eq!(client.base_url(), "https://svc.example.com");
        assert_eq!(
            client.endpoint("/export-tiff"),
            "https://svc.example.com/export-tiff"
        );
    }

    #[test]
    fn default_options() {
        let opts = ServiceClientOptions::default();
        assert_eq!(opts.request_timeout, Duration::from_secs(30));
        assert_eq!(opts.max_retries, 2);
    }
}
