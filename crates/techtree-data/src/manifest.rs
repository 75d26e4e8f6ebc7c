//! Load manifest: which sources make up a playset, and in what order.
//!
//! Deserialized from RON, TOML or JSON (see [`crate::loader::deserialize_file`]).
//! Relative source paths are resolved against the manifest's directory.

use crate::loader::{DataLoadError, deserialize_file, find_data_file};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use techtree_core::record::BASE_SOURCE_ID;
use techtree_core::registry::IngestPolicy;

/// Base name looked up by [`LoadManifest::find`].
pub const MANIFEST_BASE_NAME: &str = "playset";

fn default_extension() -> String {
    "txt".to_string()
}

fn default_technology_dir() -> PathBuf {
    PathBuf::from("common/technology")
}

fn default_variables_dir() -> PathBuf {
    PathBuf::from("common/scripted_variables")
}

// ===========================================================================
// Schema
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadManifest {
    #[serde(default)]
    pub policy: IngestPolicy,

    /// Script file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default)]
    pub sources: Vec<SourceData>,

    /// Directory relative source paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    /// `"base"` or a mod id.
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    pub path: PathBuf,

    /// Explicit position; mods default to their 1-based position among mods.
    #[serde(default)]
    pub load_order: Option<u32>,

    #[serde(default = "default_technology_dir")]
    pub technology_dir: PathBuf,

    #[serde(default = "default_variables_dir")]
    pub variables_dir: PathBuf,
}

impl SourceData {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: None,
            path: path.into(),
            load_order: None,
            technology_dir: default_technology_dir(),
            variables_dir: default_variables_dir(),
        }
    }

    pub fn is_base(&self) -> bool {
        self.id == BASE_SOURCE_ID
    }
}

/// A source with its paths and load order settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub id: String,
    pub name: Option<String>,
    pub root: PathBuf,
    pub technology_dir: PathBuf,
    pub variables_dir: PathBuf,
    pub load_order: u32,
}

// ===========================================================================
// Loading and resolution
// ===========================================================================

impl Default for LoadManifest {
    fn default() -> Self {
        Self {
            policy: IngestPolicy::default(),
            extension: default_extension(),
            sources: Vec::new(),
            base_dir: None,
        }
    }
}

impl LoadManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: SourceData) -> Self {
        self.sources.push(source);
        self
    }

    /// Read a manifest file; relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, DataLoadError> {
        let mut manifest: LoadManifest = deserialize_file(path)?;
        manifest.base_dir = path.parent().map(Path::to_path_buf);
        tracing::debug!(
            file = %path.display(),
            sources = manifest.sources.len(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    /// Look for `playset.{ron,toml,json}` in `dir`.
    pub fn find(dir: &Path) -> Result<Option<Self>, DataLoadError> {
        match find_data_file(dir, MANIFEST_BASE_NAME)? {
            Some(path) => Self::load(&path).map(Some),
            None => Ok(None),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Sources in ingest order: ascending load order, ties kept in manifest
    /// order. The base source is always 0.
    pub fn resolved_sources(&self) -> Vec<ResolvedSource> {
        let mut mod_position = 0u32;
        let mut resolved: Vec<ResolvedSource> = self
            .sources
            .iter()
            .map(|source| {
                let load_order = if source.is_base() {
                    0
                } else {
                    mod_position += 1;
                    source.load_order.unwrap_or(mod_position)
                };
                let root = self.resolve_path(&source.path);
                ResolvedSource {
                    id: source.id.clone(),
                    name: source.name.clone(),
                    technology_dir: root.join(&source.technology_dir),
                    variables_dir: root.join(&source.variables_dir),
                    root,
                    load_order,
                }
            })
            .collect();
        resolved.sort_by_key(|s| s.load_order);
        resolved
    }
}
