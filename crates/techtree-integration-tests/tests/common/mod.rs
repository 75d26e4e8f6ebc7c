//! Helpers shared by the integration test binaries.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use techtree_core::TechCatalog;
use techtree_core::record::Provenance;

/// Route `tracing` output through the test harness. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Catalog with `text` ingested as one base file and the graph built.
pub fn catalog_from(text: &str) -> TechCatalog {
    init_tracing();
    let mut catalog = TechCatalog::new();
    catalog.ingest_text(text, Provenance::base("common/technology/test.txt"));
    catalog.rebuild_graph();
    catalog
}

pub fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "techtree_it_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

pub fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}
