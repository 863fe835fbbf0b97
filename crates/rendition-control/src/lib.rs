//! Control-plane client.
//!
//! This crate provides:
//! - Typed request/response bodies for the upload endpoints
//! - An HTTP client for upload sessions and the completion callback
//! - Multipart upload sessions with a bounded part pool and per-part retry

pub mod client;
pub mod error;
pub mod retry;
pub mod session;
pub mod types;

pub use client::{ControlPlaneClient, ControlPlaneConfig};
pub use error::{ControlPlaneError, ControlPlaneResult};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use session::{FileMeta, UploadKind, UploadOptions, UploadSession, UploadSessionManager};
pub use types::{
    CompletedPart, CompletionNotice, FileUploadRequest, FinishUploadRequest, QualityUploadRequest,
    UploadTicket,
};
