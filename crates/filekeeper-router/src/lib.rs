//! Filekeeper Router Library
//!
//! Routes files dropped into the drop-zone folder to their destination
//! folders by extension, with content-hash duplicate detection and
//! collision-safe naming.

pub mod report;
pub mod router;

pub use report::RoutingReport;
pub use router::{FileRouter, RouterError};
