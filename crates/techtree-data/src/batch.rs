//! Layered playset loading.
//!
//! Sources are ingested in ascending load order. Within a source, scripted
//! variable files load first, then technology files in file-name order.
//! With the `parallel` feature the parse/extract phase of one source's
//! technology files runs on rayon; ingestion always stays sequential.

use crate::cache::FileCache;
use crate::loader::{DataLoadError, find_script_files};
use crate::manifest::{LoadManifest, ResolvedSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use techtree_core::TechCatalog;
use techtree_core::diagnostics::Diagnostic;
use techtree_core::record::Provenance;

// ===========================================================================
// StopHandle
// ===========================================================================

/// Cooperative cancellation, checked between files.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ===========================================================================
// LoadReport
// ===========================================================================

/// Partial-success summary of a batch load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub sources_loaded: usize,
    pub files_loaded: usize,
    pub records_ingested: usize,
    pub variables_declared: usize,
    /// Set when the batch halted on a stop request.
    pub stopped: bool,
    /// I/O failures; the files involved were skipped.
    pub errors: Vec<DataLoadError>,
    /// Script and ingest diagnostics drained from the catalog.
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.diagnostics.is_empty()
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load every source of `manifest` into `catalog`. The catalog's ingest
/// policy is set from the manifest. The graph is not rebuilt.
pub fn load_playset(
    catalog: &mut TechCatalog,
    manifest: &LoadManifest,
    stop: &StopHandle,
) -> LoadReport {
    load_playset_cached(catalog, manifest, stop, &mut FileCache::new())
}

/// Like [`load_playset`], reading through `cache`.
pub fn load_playset_cached(
    catalog: &mut TechCatalog,
    manifest: &LoadManifest,
    stop: &StopHandle,
    cache: &mut FileCache,
) -> LoadReport {
    catalog.set_policy(manifest.policy);
    let mut report = LoadReport::default();

    for source in manifest.resolved_sources() {
        if stop.is_stopped() {
            report.stopped = true;
            break;
        }
        if !source.root.is_dir() {
            tracing::warn!(
                source = %source.id,
                dir = %source.root.display(),
                "source directory missing"
            );
            report.errors.push(DataLoadError::MissingSourceDir {
                source_id: source.id.clone(),
                dir: source.root.clone(),
            });
            continue;
        }

        load_source(catalog, &source, &manifest.extension, stop, cache, &mut report);
        if report.stopped {
            break;
        }
        report.sources_loaded += 1;
    }

    report.diagnostics = catalog.drain_diagnostics();
    tracing::info!(
        sources = report.sources_loaded,
        files = report.files_loaded,
        records = report.records_ingested,
        variables = report.variables_declared,
        errors = report.errors.len(),
        diagnostics = report.diagnostics.len(),
        stopped = report.stopped,
        "playset loaded"
    );
    report
}

fn list_files(dir: &Path, extension: &str, report: &mut LoadReport) -> Vec<PathBuf> {
    match find_script_files(dir, extension) {
        Ok(files) => files,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "cannot list scripts");
            report.errors.push(err);
            Vec::new()
        }
    }
}

fn provenance_for(source: &ResolvedSource, path: &Path) -> Provenance {
    let provenance = Provenance::new(path.display().to_string(), &source.id, source.load_order);
    match &source.name {
        Some(name) => provenance.with_name(name),
        None => provenance,
    }
}

fn load_source(
    catalog: &mut TechCatalog,
    source: &ResolvedSource,
    extension: &str,
    stop: &StopHandle,
    cache: &mut FileCache,
    report: &mut LoadReport,
) {
    tracing::debug!(source = %source.id, load_order = source.load_order, "loading source");

    for path in list_files(&source.variables_dir, extension, report) {
        if stop.is_stopped() {
            report.stopped = true;
            return;
        }
        match cache.read(&path) {
            Ok(text) => {
                report.variables_declared +=
                    catalog.declare_variables(&text, &path.display().to_string());
                report.files_loaded += 1;
            }
            Err(err) => report.errors.push(err),
        }
    }

    let tech_files = list_files(&source.technology_dir, extension, report);
    let mut texts: Vec<(PathBuf, Arc<str>)> = Vec::with_capacity(tech_files.len());
    for path in tech_files {
        match cache.read(&path) {
            Ok(text) => texts.push((path, text)),
            Err(err) => report.errors.push(err),
        }
    }

    ingest_texts(catalog, source, &texts, stop, report);
}

#[cfg(not(feature = "parallel"))]
fn ingest_texts(
    catalog: &mut TechCatalog,
    source: &ResolvedSource,
    texts: &[(PathBuf, Arc<str>)],
    stop: &StopHandle,
    report: &mut LoadReport,
) {
    for (path, text) in texts {
        if stop.is_stopped() {
            report.stopped = true;
            return;
        }
        let accepted = catalog.ingest_text(text, provenance_for(source, path));
        report.records_ingested += accepted.len();
        report.files_loaded += 1;
    }
}

#[cfg(feature = "parallel")]
fn ingest_texts(
    catalog: &mut TechCatalog,
    source: &ResolvedSource,
    texts: &[(PathBuf, Arc<str>)],
    stop: &StopHandle,
    report: &mut LoadReport,
) {
    use rayon::prelude::*;

    let extractions: Vec<_> = {
        let shared: &TechCatalog = catalog;
        texts
            .par_iter()
            .map(|(path, text)| shared.extract(text, &provenance_for(source, path)))
            .collect()
    };

    for extraction in extractions {
        if stop.is_stopped() {
            report.stopped = true;
            return;
        }
        report.records_ingested += catalog.ingest_extraction(extraction).len();
        report.files_loaded += 1;
    }
}
