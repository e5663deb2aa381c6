//! Filekeeper Backup Library
//!
//! Bundle creation, two-tier local rotation, upload orchestration (simple
//! retrying and chunked resumable), and mirror sync. Everything above the
//! `StorageProvider` trait is backend-agnostic.

pub mod bundle;
pub mod chunked;
pub mod error;
pub mod mirror;
pub mod rotation;
pub mod upload;

pub use bundle::create_bundle;
pub use chunked::{ChunkedOutcome, ChunkedUploader, UploadState, CHUNK_SIZE};
pub use error::BackupError;
pub use mirror::mirror_tree;
pub use rotation::{find_latest_bundle, rotate_bundles, RotationSummary};
pub use upload::{BackupUploader, UploadOutcome};
