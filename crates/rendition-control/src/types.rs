//! Control-plane request/response types.

use serde::{Deserialize, Serialize};

/// Body of `POST {callback}/request-file-upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadRequest {
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
}

/// Body of `POST {callback}/request-quality-upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityUploadRequest {
    pub quality: String,
    pub file_size: u64,
    pub content_type: String,
}

/// Multipart upload granted by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub multipart_upload_id: String,
    pub upload_key: String,
    /// One presigned PUT target per part, in part order
    pub presigned_urls: Vec<String>,
    /// Bytes per part (the last part may be shorter)
    pub part_size: u64,
}

/// One uploaded part, as echoed back to finish the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    /// Exactly as returned by the storage backend, quotes included
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Body of `POST {callback}/finish-file-upload` and `/finish-quality-upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishUploadRequest {
    pub upload_key: String,
    pub multipart_upload_id: String,
    pub parts: Vec<CompletedPart>,
}

/// Body of `POST {callback}/complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub video_id: String,
    /// Whole seconds, truncated
    pub duration: u64,
}
