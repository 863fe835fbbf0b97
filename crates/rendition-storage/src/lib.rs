//! Cloudflare R2 storage client.
//!
//! This crate provides:
//! - Source download and artifact upload against an S3-compatible bucket
//! - Object key layout for videos and their renditions

pub mod client;
pub mod error;
pub mod keys;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{output_key, source_key};
