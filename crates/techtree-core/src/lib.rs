//! Techtree Core -- technology records, the override-aware registry and the
//! prerequisite graph.
//!
//! # Pipeline
//!
//! 1. [`resolve::extract_records`] -- a parsed document to typed
//!    [`record::TechRecord`]s, resolving `@variables`.
//! 2. [`registry::TechRegistry::ingest`] -- layered insert/override by id.
//! 3. [`graph::TechGraph::build`] -- adjacency, depth, width and canonical
//!    paths from a registry snapshot.
//!
//! [`catalog::TechCatalog`] ties these together for one run and hands out a
//! [`catalog::CatalogView`] for queries while its graph is current.
//!
//! ```rust,ignore
//! let mut catalog = TechCatalog::new();
//! catalog.ingest_text(text, Provenance::base("common/technology/00_phys.txt"));
//! catalog.rebuild_graph();
//! let view = catalog.view().unwrap();
//! let path = view.path_to_root("tech_lasers_2");
//! ```
//!
//! Nothing here returns an error for malformed input. Problems are queued as
//! [`diagnostics::Diagnostic`]s and drained by the caller.

pub mod catalog;
pub mod diagnostics;
pub mod graph;
pub mod names;
pub mod output;
pub mod record;
pub mod registry;
pub mod resolve;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use catalog::{CatalogView, TechCatalog};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use graph::{GraphError, TechGraph, build_graph};
pub use record::{PrereqCondition, Prerequisites, Provenance, TechFlags, TechRecord};
pub use registry::{IngestError, IngestPolicy, TechRegistry};
pub use resolve::{Extraction, ResolutionError};
