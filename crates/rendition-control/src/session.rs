//! Multipart upload sessions.
//!
//! An artifact is uploaded in three steps: `open` asks the control plane for
//! a ticket (one presigned target per part), `transfer_parts` PUTs each byte
//! range to its target, `finalize` hands the collected ETags back.
//!
//! Part `k` (1-based) of a file of `S` bytes with part size `P` covers bytes
//! `[(k-1)P, min(kP, S))`. An empty file is sent as a single empty part.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use futures::{stream, StreamExt, TryStreamExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use rendition_models::content_type::MP4_VIDEO;
use rendition_models::{base_name, content_type_for};

use crate::client::ControlPlaneClient;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::retry::{retry_async, RetryConfig};
use crate::types::{
    CompletedPart, FileUploadRequest, FinishUploadRequest, QualityUploadRequest, UploadTicket,
};

/// Which endpoint pair an upload goes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadKind {
    /// `request-file-upload` / `finish-file-upload`
    File,
    /// `request-quality-upload` / `finish-quality-upload`, keyed by rung name
    Quality(String),
}

/// What the control plane is told about the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub kind: UploadKind,
}

impl FileMeta {
    /// Describe a file on disk. Quality uploads are always `video/mp4`.
    pub async fn from_path(path: &Path, kind: UploadKind) -> ControlPlaneResult<Self> {
        let size = tokio::fs::metadata(path).await?.len();
        let content_type = match kind {
            UploadKind::File => content_type_for(path),
            UploadKind::Quality(_) => MP4_VIDEO.to_string(),
        };
        Ok(Self {
            name: base_name(path),
            size,
            content_type,
            kind,
        })
    }
}

/// One artifact's upload in progress.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub path: PathBuf,
    pub meta: FileMeta,
    pub ticket: UploadTicket,
    /// Filled by `transfer_parts`, ascending by part number
    pub completed: Vec<CompletedPart>,
}

impl UploadSession {
    /// Number of parts the file splits into under this ticket.
    pub fn part_count(&self) -> ControlPlaneResult<u32> {
        part_count(self.meta.size, self.ticket.part_size)
    }
}

/// Tuning for the upload pools.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Parts of one artifact in flight at once
    pub part_concurrency: usize,
    /// Artifacts uploaded at once
    pub artifact_concurrency: usize,
    /// Backoff for individual part PUTs
    pub part_retry: RetryConfig,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            part_concurrency: 4,
            artifact_concurrency: 1,
            part_retry: RetryConfig::new("put_part"),
        }
    }
}

/// Number of parts for `size` bytes at `part_size` bytes per part.
pub fn part_count(size: u64, part_size: u64) -> ControlPlaneResult<u32> {
    if part_size == 0 {
        return Err(ControlPlaneError::protocol("part_size must be positive"));
    }
    // An empty file still needs one (empty) part: a multipart upload cannot
    // be completed with zero parts, so a 0-byte artifact expects one target.
    let n = size.div_ceil(part_size).max(1);
    u32::try_from(n).map_err(|_| ControlPlaneError::protocol(format!("{} parts is too many", n)))
}

/// Byte offset and length of part `part_number` (1-based).
pub fn part_range(part_number: u32, size: u64, part_size: u64) -> (u64, u64) {
    let start = u64::from(part_number - 1) * part_size;
    let end = (start + part_size).min(size);
    (start, end.saturating_sub(start))
}

/// Drives upload sessions against one control plane.
#[derive(Clone)]
pub struct UploadSessionManager {
    client: ControlPlaneClient,
    options: UploadOptions,
}

impl UploadSessionManager {
    pub fn new(client: ControlPlaneClient, options: UploadOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &ControlPlaneClient {
        &self.client
    }

    /// Request a ticket for `path`.
    pub async fn open(&self, path: &Path, meta: FileMeta) -> ControlPlaneResult<UploadSession> {
        let ticket = match &meta.kind {
            UploadKind::File => {
                self.client
                    .request_file_upload(&FileUploadRequest {
                        file_name: meta.name.clone(),
                        file_size: meta.size,
                        content_type: meta.content_type.clone(),
                    })
                    .await?
            }
            UploadKind::Quality(quality) => {
                self.client
                    .request_quality_upload(&QualityUploadRequest {
                        quality: quality.clone(),
                        file_size: meta.size,
                        content_type: meta.content_type.clone(),
                    })
                    .await?
            }
        };

        debug!(
            "Opened upload {} for {} ({} bytes, {} targets of {} bytes)",
            ticket.multipart_upload_id,
            meta.name,
            meta.size,
            ticket.presigned_urls.len(),
            ticket.part_size
        );

        Ok(UploadSession {
            path: path.to_path_buf(),
            meta,
            ticket,
            completed: Vec::new(),
        })
    }

    /// PUT every part to its target and record the returned ETags.
    pub async fn transfer_parts(&self, session: &mut UploadSession) -> ControlPlaneResult<()> {
        let n = session.part_count()?;
        let targets = &session.ticket.presigned_urls;
        if targets.len() != n as usize {
            return Err(ControlPlaneError::protocol(format!(
                "{} is {} bytes, {} parts of {} bytes, but {} presigned targets were issued",
                session.meta.name,
                session.meta.size,
                n,
                session.ticket.part_size,
                targets.len()
            )));
        }

        let path = session.path.as_path();
        let size = session.meta.size;
        let part_size = session.ticket.part_size;

        let mut parts: Vec<CompletedPart> = stream::iter(targets.iter().cloned().zip(1..=n))
            .map(|(target, part_number)| async move {
                let (offset, len) = part_range(part_number, size, part_size);
                let body = read_chunk(path, offset, len).await?;
                let etag = self.put_part_with_retry(part_number, &target, body).await?;
                Ok::<_, ControlPlaneError>(CompletedPart { part_number, etag })
            })
            .buffer_unordered(self.options.part_concurrency.max(1))
            .try_collect()
            .await?;

        parts.sort_by_key(|p| p.part_number);
        session.completed = parts;
        Ok(())
    }

    /// Commit the upload. The part list must be exactly `1..=n`, ascending.
    pub async fn finalize(&self, session: &UploadSession) -> ControlPlaneResult<()> {
        let n = session.part_count()?;
        if !session.completed.iter().map(|p| p.part_number).eq(1..=n) {
            let numbers: Vec<u32> = session.completed.iter().map(|p| p.part_number).collect();
            return Err(ControlPlaneError::protocol(format!(
                "refusing to finalize {}: parts {:?} are not 1..={}",
                session.meta.name, numbers, n
            )));
        }

        let request = FinishUploadRequest {
            upload_key: session.ticket.upload_key.clone(),
            multipart_upload_id: session.ticket.multipart_upload_id.clone(),
            parts: session.completed.clone(),
        };

        match session.meta.kind {
            UploadKind::File => self.client.finish_file_upload(&request).await,
            UploadKind::Quality(_) => self.client.finish_quality_upload(&request).await,
        }
    }

    /// Open, transfer and finalize one artifact. Returns its upload key.
    pub async fn upload_artifact(
        &self,
        path: &Path,
        kind: UploadKind,
    ) -> ControlPlaneResult<String> {
        let meta = FileMeta::from_path(path, kind).await?;
        let mut session = self.open(path, meta).await?;
        self.transfer_parts(&mut session).await?;
        self.finalize(&session).await?;

        info!(
            "Uploaded {} as {} ({} parts)",
            path.display(),
            session.ticket.upload_key,
            session.completed.len()
        );
        Ok(session.ticket.upload_key)
    }

    /// Upload every artifact, each through its own session.
    ///
    /// Keys come back in input order. The first failure aborts the rest.
    pub async fn upload_all(
        &self,
        artifacts: &[(PathBuf, UploadKind)],
    ) -> ControlPlaneResult<Vec<String>> {
        stream::iter(artifacts.iter().cloned())
            .map(|(path, kind)| async move { self.upload_artifact(&path, kind).await })
            .buffered(self.options.artifact_concurrency.max(1))
            .try_collect()
            .await
    }

    async fn put_part_with_retry(
        &self,
        part_number: u32,
        target: &str,
        body: Vec<u8>,
    ) -> ControlPlaneResult<String> {
        let mut retry = self.options.part_retry.clone();
        retry.operation_name = format!("put_part {}", part_number);

        retry_async(&retry, ControlPlaneError::is_retryable, || {
            self.client.put_part(part_number, target, body.clone())
        })
        .await
        .into_result()
    }
}

async fn read_chunk(path: &Path, offset: u64, len: u64) -> ControlPlaneResult<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let len = usize::try_from(len)
        .map_err(|_| ControlPlaneError::protocol(format!("part of {} bytes is too large", len)))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ControlPlaneConfig;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    // ========================================================================
    // Part arithmetic
    // ========================================================================

    #[test]
    fn test_part_count() {
        assert_eq!(part_count(10, 4).unwrap(), 3);
        assert_eq!(part_count(8, 4).unwrap(), 2);
        assert_eq!(part_count(1, 4).unwrap(), 1);
        assert_eq!(part_count(0, 4).unwrap(), 1);
        assert!(matches!(
            part_count(10, 0),
            Err(ControlPlaneError::Protocol(_))
        ));
    }

    #[test]
    fn test_part_ranges_cover_file() {
        let (size, part_size) = (10u64, 4u64);
        let n = part_count(size, part_size).unwrap();
        let ranges: Vec<_> = (1..=n).map(|k| part_range(k, size, part_size)).collect();

        assert_eq!(ranges, [(0, 4), (4, 4), (8, 2)]);
        // every part but the last is exactly part_size, the last is S - P(n-1)
        assert_eq!(
            ranges.last().unwrap().1,
            size - part_size * u64::from(n - 1)
        );
    }

    #[test]
    fn test_empty_file_is_one_empty_part() {
        assert_eq!(part_range(1, 0, 4), (0, 0));
    }

    // ========================================================================
    // Sessions against a mock control plane
    // ========================================================================

    /// Responds to part PUTs with an ETag derived from the path and body size.
    struct EchoEtag;

    impl Respond for EchoEtag {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let etag = format!("\"{}-{}\"", request.url.path(), request.body.len());
            ResponseTemplate::new(200).insert_header("ETag", etag.as_str())
        }
    }

    fn manager(server: &MockServer, part_concurrency: usize) -> UploadSessionManager {
        let config = ControlPlaneConfig::new(&format!("{}/cp", server.uri())).unwrap();
        let options = UploadOptions {
            part_concurrency,
            artifact_concurrency: 1,
            part_retry: RetryConfig::new("put_part").with_base_delay(Duration::from_millis(1)),
        };
        UploadSessionManager::new(ControlPlaneClient::new(config).unwrap(), options)
    }

    fn ticket(server: &MockServer, parts: usize, part_size: u64) -> Value {
        let urls: Vec<String> = (1..=parts)
            .map(|k| format!("{}/r2/part-{}", server.uri(), k))
            .collect();
        json!({
            "multipart_upload_id": "mp-1",
            "upload_key": "video/abc/video_720p.mp4",
            "presigned_urls": urls,
            "part_size": part_size
        })
    }

    fn write_file(dir: &TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, data).unwrap();
        path
    }

    async fn finish_body(server: &MockServer, endpoint: &str) -> Value {
        let requests = server.received_requests().await.unwrap();
        let finish = requests
            .iter()
            .find(|r| r.url.path() == endpoint)
            .expect("finish request");
        serde_json::from_slice(&finish.body).unwrap()
    }

    #[tokio::test]
    async fn test_upload_artifact_parts_and_finalize() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "manifest.mpd", 10);

        Mock::given(method("POST"))
            .and(path("/cp/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 3, 4)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/r2/part-\d+$"))
            .respond_with(EchoEtag)
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cp/finish-file-upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let key = manager(&server, 4)
            .upload_artifact(&file, UploadKind::File)
            .await
            .unwrap();
        assert_eq!(key, "video/abc/video_720p.mp4");

        let requests = server.received_requests().await.unwrap();
        let open: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            open,
            json!({"file_name": "manifest.mpd", "file_size": 10, "content_type": "application/dash+xml"})
        );

        let mut sizes: Vec<(String, usize)> = requests
            .iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r| (r.url.path().to_string(), r.body.len()))
            .collect();
        sizes.sort();
        assert_eq!(
            sizes,
            [
                ("/r2/part-1".to_string(), 4),
                ("/r2/part-2".to_string(), 4),
                ("/r2/part-3".to_string(), 2)
            ]
        );

        let finish = finish_body(&server, "/cp/finish-file-upload").await;
        assert_eq!(
            finish,
            json!({
                "upload_key": "video/abc/video_720p.mp4",
                "multipart_upload_id": "mp-1",
                "parts": [
                    {"PartNumber": 1, "ETag": "\"/r2/part-1-4\""},
                    {"PartNumber": 2, "ETag": "\"/r2/part-2-4\""},
                    {"PartNumber": 3, "ETag": "\"/r2/part-3-2\""}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_empty_artifact_sends_one_empty_part() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "audio.m3u8", 0);

        Mock::given(method("POST"))
            .and(path("/cp/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 1, 4)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/r2/part-1"))
            .respond_with(EchoEtag)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cp/finish-file-upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        manager(&server, 4)
            .upload_artifact(&file, UploadKind::File)
            .await
            .unwrap();

        let finish = finish_body(&server, "/cp/finish-file-upload").await;
        assert_eq!(
            finish["parts"],
            json!([{"PartNumber": 1, "ETag": "\"/r2/part-1-0\""}])
        );
    }

    #[tokio::test]
    async fn test_empty_artifact_without_targets_is_protocol_error() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "audio.m3u8", 0);

        Mock::given(method("POST"))
            .and(path("/cp/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 0, 4)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(EchoEtag)
            .expect(0)
            .mount(&server)
            .await;

        let err = manager(&server, 4)
            .upload_artifact(&file, UploadKind::File)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlPlaneError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_part_bytes_match_file_ranges() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "audio.mp4", 9);
        let original = std::fs::read(&file).unwrap();

        Mock::given(method("POST"))
            .and(path("/cp/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 3, 3)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(EchoEtag)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cp/finish-file-upload"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        manager(&server, 1)
            .upload_artifact(&file, UploadKind::File)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let mut puts: Vec<_> = requests
            .iter()
            .filter(|r| r.method.as_str() == "PUT")
            .collect();
        puts.sort_by_key(|r| r.url.path().to_string());
        let reassembled: Vec<u8> = puts.iter().flat_map(|r| r.body.clone()).collect();
        assert_eq!(reassembled, original);
    }

    #[tokio::test]
    async fn test_quality_upload_uses_quality_endpoints() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "video_720p.mp4", 5);

        Mock::given(method("POST"))
            .and(path("/cp/request-quality-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 1, 8)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(EchoEtag)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cp/finish-quality-upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        manager(&server, 4)
            .upload_artifact(&file, UploadKind::Quality("720p".to_string()))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let open: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            open,
            json!({"quality": "720p", "file_size": 5, "content_type": "video/mp4"})
        );
    }

    #[tokio::test]
    async fn test_target_count_mismatch_is_protocol_error() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "thumbnail.jpg", 10);

        Mock::given(method("POST"))
            .and(path("/cp/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 2, 4)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(EchoEtag)
            .expect(0)
            .mount(&server)
            .await;

        let err = manager(&server, 4)
            .upload_artifact(&file, UploadKind::File)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlPlaneError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_transient_part_failure_is_retried() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "audio.m3u8", 4);

        Mock::given(method("POST"))
            .and(path("/cp/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 1, 4)))
            .mount(&server)
            .await;
        // Mounted first, so it answers the first request; then it is used up.
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(EchoEtag)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cp/finish-file-upload"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        manager(&server, 1)
            .upload_artifact(&file, UploadKind::File)
            .await
            .unwrap();

        let finish = finish_body(&server, "/cp/finish-file-upload").await;
        assert_eq!(finish["parts"][0]["ETag"], "\"/r2/part-1-4\"");
    }

    #[tokio::test]
    async fn test_forbidden_part_is_not_retried() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "audio.m3u8", 4);

        Mock::given(method("POST"))
            .and(path("/cp/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 1, 4)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = manager(&server, 1)
            .upload_artifact(&file, UploadKind::File)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlPlaneError::PartTransfer { part_number: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_finalize_rejects_gaps_and_duplicates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let part = |n: u32| CompletedPart {
            part_number: n,
            etag: format!("\"e{}\"", n),
        };
        let mut session = UploadSession {
            path: PathBuf::from("unused"),
            meta: FileMeta {
                name: "video_480p.mp4".to_string(),
                size: 12,
                content_type: "video/mp4".to_string(),
                kind: UploadKind::File,
            },
            ticket: UploadTicket {
                multipart_upload_id: "mp-1".to_string(),
                upload_key: "k".to_string(),
                presigned_urls: vec!["a".into(), "b".into(), "c".into()],
                part_size: 4,
            },
            completed: vec![part(1), part(3)],
        };
        let manager = manager(&server, 1);

        assert!(matches!(
            manager.finalize(&session).await,
            Err(ControlPlaneError::Protocol(_))
        ));

        session.completed = vec![part(1), part(2), part(2)];
        assert!(matches!(
            manager.finalize(&session).await,
            Err(ControlPlaneError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_all_one_session_per_artifact() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "manifest.mpd", 3);
        let b = write_file(&dir, "manifest.m3u8", 3);

        Mock::given(method("POST"))
            .and(path("/cp/request-file-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticket(&server, 1, 4)))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(EchoEtag)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cp/finish-file-upload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let keys = manager(&server, 4)
            .upload_all(&[(a, UploadKind::File), (b, UploadKind::File)])
            .await
            .unwrap();
        assert_eq!(keys.len(), 2);
    }
}
