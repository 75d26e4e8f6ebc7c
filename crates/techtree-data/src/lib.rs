//! Techtree Data -- reads technology scripts and playset manifests from disk
//! and feeds them into a [`techtree_core::TechCatalog`].

pub mod batch;
pub mod cache;
pub mod loader;
pub mod manifest;

pub use batch::{LoadReport, StopHandle, load_playset, load_playset_cached};
pub use cache::FileCache;
pub use loader::{DataLoadError, ingest_file};
pub use manifest::{LoadManifest, SourceData};
