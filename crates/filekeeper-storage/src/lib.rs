//! Filekeeper Storage Library
//!
//! This crate provides the storage-provider abstraction and its backend
//! implementations. It defines the `StorageProvider` trait every backend must
//! satisfy, plus the local-disk, S3-compatible, Dropbox-style, and Drive-style
//! variants and the factory that constructs a validated instance from
//! configuration.
//!
//! # Remote ids
//!
//! Every provider returns an opaque `remote id` from upload, create-folder,
//! and list operations. The id is backend-specific: a root-relative path for
//! local disk, an object key for S3, a backend-assigned identifier for the
//! Dropbox- and Drive-style backends. Callers must never assume it is a path
//! or a URL.

pub mod factory;
#[cfg(feature = "storage-dropbox")]
pub mod dropbox;
#[cfg(feature = "storage-gdrive")]
pub mod gdrive;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-dropbox")]
pub use dropbox::DropboxProvider;
pub use factory::create_provider;
pub use filekeeper_core::ProviderKind;
#[cfg(feature = "storage-gdrive")]
pub use gdrive::GoogleDriveProvider;
#[cfg(feature = "storage-local")]
pub use local::LocalProvider;
#[cfg(feature = "storage-s3")]
pub use s3::S3Provider;
pub use traits::{
    ProviderInfo, RemoteFileRecord, StorageError, StorageProvider, StorageResult,
};
