//! Control-plane HTTP client.

use std::time::Duration;

use reqwest::header::ETAG;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{is_transient_status, ControlPlaneError, ControlPlaneResult};
use crate::types::{
    CompletionNotice, FileUploadRequest, FinishUploadRequest, QualityUploadRequest, UploadTicket,
};

/// Configuration for the control-plane client.
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    /// Base URL; endpoints are appended as path segments
    pub callback_url: Url,
    /// Per-request timeout, also applied to part PUTs
    pub timeout: Duration,
}

impl ControlPlaneConfig {
    pub fn new(callback_url: &str) -> ControlPlaneResult<Self> {
        Ok(Self {
            callback_url: Url::parse(callback_url)?,
            timeout: Duration::from_secs(60),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{callback}/{name}`, keeping any path already present on the base.
    pub fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.callback_url.as_str().trim_end_matches('/'),
            name
        )
    }
}

/// Client for the control plane and the presigned part targets it hands out.
#[derive(Clone)]
pub struct ControlPlaneClient {
    http: Client,
    config: ControlPlaneConfig,
}

impl ControlPlaneClient {
    pub fn new(config: ControlPlaneConfig) -> ControlPlaneResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ControlPlaneError::Network)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    /// Open a multipart upload for an arbitrary artifact.
    pub async fn request_file_upload(
        &self,
        request: &FileUploadRequest,
    ) -> ControlPlaneResult<UploadTicket> {
        self.post_json("request-file-upload", request).await
    }

    /// Open a multipart upload for one quality rendition.
    pub async fn request_quality_upload(
        &self,
        request: &QualityUploadRequest,
    ) -> ControlPlaneResult<UploadTicket> {
        self.post_json("request-quality-upload", request).await
    }

    pub async fn finish_file_upload(
        &self,
        request: &FinishUploadRequest,
    ) -> ControlPlaneResult<()> {
        self.post("finish-file-upload", request).await.map(drop)
    }

    pub async fn finish_quality_upload(
        &self,
        request: &FinishUploadRequest,
    ) -> ControlPlaneResult<()> {
        self.post("finish-quality-upload", request).await.map(drop)
    }

    /// Report a finished job.
    pub async fn notify_complete(&self, notice: &CompletionNotice) -> ControlPlaneResult<()> {
        self.post("complete", notice).await?;
        info!(
            "Completion callback sent for {} (duration {}s)",
            notice.video_id, notice.duration
        );
        Ok(())
    }

    /// PUT one part to its presigned target and return the ETag header verbatim.
    pub async fn put_part(
        &self,
        part_number: u32,
        target: &str,
        body: Vec<u8>,
    ) -> ControlPlaneResult<String> {
        let size = body.len();
        let response = self.http.put(target).body(body).send().await.map_err(|e| {
            ControlPlaneError::PartTransfer {
                part_number,
                message: e.to_string(),
                retryable: true,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControlPlaneError::PartTransfer {
                part_number,
                message: format!("storage returned {}: {}", status, body),
                retryable: is_transient_status(status),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ControlPlaneError::PartTransfer {
                part_number,
                message: "response has no ETag header".to_string(),
                retryable: false,
            })?;

        debug!(
            "Part {} stored ({} bytes), ETag {}",
            part_number, size, etag
        );
        Ok(etag)
    }

    async fn post_json<B, R>(&self, name: &str, body: &B) -> ControlPlaneResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self.post(name, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ControlPlaneError::protocol(format!("unexpected response from {}: {}", name, e))
        })
    }

    async fn post<B>(&self, name: &str, body: &B) -> ControlPlaneResult<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.endpoint(name);
        debug!("POST {}", url);

        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControlPlaneError::HttpStatus {
                endpoint: name.to_string(),
                status,
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ControlPlaneClient {
        let config = ControlPlaneConfig::new(&format!("{}/api/videos", server.uri())).unwrap();
        ControlPlaneClient::new(config).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = ControlPlaneConfig::new("https://cp.example.com/api/videos/").unwrap();
        assert_eq!(
            config.endpoint("complete"),
            "https://cp.example.com/api/videos/complete"
        );
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_callback_url() {
        assert!(matches!(
            ControlPlaneConfig::new("not a url"),
            Err(ControlPlaneError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_request_file_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/videos/request-file-upload"))
            .and(body_json(json!({
                "file_name": "manifest.mpd",
                "file_size": 42,
                "content_type": "application/dash+xml"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "multipart_upload_id": "mp-1",
                "upload_key": "video/abc/manifest.mpd",
                "presigned_urls": ["https://r2/p1"],
                "part_size": 1024
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ticket = client_for(&server)
            .await
            .request_file_upload(&FileUploadRequest {
                file_name: "manifest.mpd".to_string(),
                file_size: 42,
                content_type: "application/dash+xml".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(ticket.multipart_upload_id, "mp-1");
        assert_eq!(ticket.presigned_urls, ["https://r2/p1"]);
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/videos/request-quality-upload"))
            .respond_with(ResponseTemplate::new(403).set_body_string("video is locked"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .request_quality_upload(&QualityUploadRequest {
                quality: "720p".to_string(),
                file_size: 10,
                content_type: "video/mp4".to_string(),
            })
            .await
            .unwrap_err();

        match err {
            ControlPlaneError::HttpStatus {
                endpoint,
                status,
                body,
            } => {
                assert_eq!(endpoint, "request-quality-upload");
                assert_eq!(status.as_u16(), 403);
                assert_eq!(body, "video is locked");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_ticket_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/videos/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .request_file_upload(&FileUploadRequest {
                file_name: "a.jpg".to_string(),
                file_size: 1,
                content_type: "image/jpeg".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ControlPlaneError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_put_part_returns_etag_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/part-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"9b2cf535f27731c974343645a3985328\""),
            )
            .mount(&server)
            .await;

        let etag = client_for(&server)
            .await
            .put_part(
                1,
                &format!("{}/bucket/part-1", server.uri()),
                b"hello".to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(etag, "\"9b2cf535f27731c974343645a3985328\"");
    }

    #[tokio::test]
    async fn test_put_part_without_etag() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .put_part(4, &format!("{}/bucket/part-4", server.uri()), vec![0; 8])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControlPlaneError::PartTransfer {
                part_number: 4,
                retryable: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_notify_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/videos/complete"))
            .and(body_json(json!({"video_id": "abc", "duration": 10})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .notify_complete(&CompletionNotice {
                video_id: "abc".to_string(),
                duration: 10,
            })
            .await
            .unwrap();
    }
}
