//! Filekeeper Core Library
//!
//! This crate provides the configuration model, provider identifiers, and the
//! best-effort outcome type shared across all Filekeeper components.

pub mod config;
pub mod outcome;
pub mod provider_kind;

// Re-export commonly used types
pub use config::{Config, DriveSettings, DropboxSettings, LocalSettings, S3Settings};
pub use outcome::BestEffort;
pub use provider_kind::ProviderKind;
