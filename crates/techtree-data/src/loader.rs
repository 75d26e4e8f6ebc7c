//! Filesystem access: format detection for config files, script discovery
//! and single-file ingest.
//!
//! This is the only layer that does I/O. Script problems never surface as
//! errors here; they become diagnostics on the catalog.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use techtree_core::TechCatalog;
use techtree_core::record::Provenance;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while reading from disk.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A config deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A source's root directory does not exist.
    #[error("source '{source_id}' directory not found: {dir}")]
    MissingSourceDir { source_id: String, dir: PathBuf },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

/// Scan a directory for a config file with the given base name.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = &found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Read a file and deserialize it according to its format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_err(e.to_string())),
    }
}

// ===========================================================================
// Script files
// ===========================================================================

/// Decode script bytes. Invalid UTF-8 is replaced rather than rejected, so
/// one stray byte only damages the entry it sits in.
pub fn decode_script(bytes: &[u8], path: &Path) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::warn!(file = %path.display(), "invalid UTF-8, decoding lossily");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

pub fn read_script(path: &Path) -> Result<String, DataLoadError> {
    let bytes = std::fs::read(path)?;
    Ok(decode_script(&bytes, path))
}

/// Script files directly inside `dir` with the given extension, sorted by
/// file name. A missing directory yields no files.
pub fn find_script_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DataLoadError> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "no script directory");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read one technology file and ingest it. Returns the number of records
/// accepted; only I/O failures are errors.
pub fn ingest_file(
    catalog: &mut TechCatalog,
    path: &Path,
    source_id: &str,
    load_order: u32,
) -> Result<usize, DataLoadError> {
    let text = read_script(path)?;
    let provenance = Provenance::new(path.display().to_string(), source_id, load_order);
    let accepted = catalog.ingest_text(&text, provenance).len();
    tracing::debug!(file = %path.display(), source_id, accepted, "ingested file");
    Ok(accepted)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    pub(crate) fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "techtree_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    pub(crate) fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    #[derive(Debug, serde::Deserialize)]
    struct Sample {
        name: String,
    }

    // -----------------------------------------------------------------------
    // detect_format / find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("playset.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("playset.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("playset.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("playset.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("playset")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_found_and_missing() {
        let dir = make_test_dir("find");
        assert_eq!(find_data_file(&dir, "playset").unwrap(), None);

        fs::write(dir.join("playset.toml"), "").unwrap();
        assert_eq!(
            find_data_file(&dir, "playset").unwrap(),
            Some(dir.join("playset.toml"))
        );

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("playset.ron"), "()").unwrap();
        fs::write(dir.join("playset.json"), "{}").unwrap();

        assert!(matches!(
            find_data_file(&dir, "playset"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // deserialize_file
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_each_format() {
        let dir = make_test_dir("deser");
        fs::write(dir.join("a.ron"), r#"(name: "ron")"#).unwrap();
        fs::write(dir.join("b.json"), r#"{"name": "json"}"#).unwrap();
        fs::write(dir.join("c.toml"), r#"name = "toml""#).unwrap();

        let a: Sample = deserialize_file(&dir.join("a.ron")).unwrap();
        let b: Sample = deserialize_file(&dir.join("b.json")).unwrap();
        let c: Sample = deserialize_file(&dir.join("c.toml")).unwrap();
        assert_eq!((a.name.as_str(), b.name.as_str(), c.name.as_str()), ("ron", "json", "toml"));

        cleanup(&dir);
    }

    #[test]
    fn deserialize_parse_error() {
        let dir = make_test_dir("deser_err");
        let path = dir.join("bad.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();

        let result: Result<Sample, _> = deserialize_file(&path);
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Script files
    // -----------------------------------------------------------------------

    #[test]
    fn script_files_sorted_and_filtered() {
        let dir = make_test_dir("scripts");
        fs::write(dir.join("10_b.txt"), "").unwrap();
        fs::write(dir.join("00_a.txt"), "").unwrap();
        fs::write(dir.join("readme.md"), "").unwrap();
        fs::create_dir_all(dir.join("nested.txt")).unwrap();

        let files = find_script_files(&dir, "txt").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["00_a.txt", "10_b.txt"]);

        assert!(find_script_files(&dir.join("absent"), "txt").unwrap().is_empty());

        cleanup(&dir);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let text = decode_script(b"tech_a = { area = ph\xffysics }", Path::new("x.txt"));
        assert!(text.starts_with("tech_a = {"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn ingest_file_counts_records() {
        let dir = make_test_dir("ingest");
        let path = dir.join("00_techs.txt");
        fs::write(
            &path,
            "\u{feff}@c = 10\ntech_a = { area = physics cost = @c }\ntech_b = { tier = 1 }\n",
        )
        .unwrap();

        let mut catalog = TechCatalog::new();
        assert_eq!(ingest_file(&mut catalog, &path, "base", 0).unwrap(), 2);
        let a = catalog.registry().get("tech_a").unwrap();
        assert_eq!(a.cost, 10.0);
        assert_eq!(a.provenance.file, path.display().to_string());

        assert!(matches!(
            ingest_file(&mut catalog, &dir.join("missing.txt"), "base", 0),
            Err(DataLoadError::Io(_))
        ));

        cleanup(&dir);
    }
}
