//! Persistence helpers for run history: atomic JSON writes and directory scans.
//!
//! Files are written to a `.tmp` sibling and renamed into place so a crash
//! mid-write never leaves a truncated history entry behind.

use std::io;
use std::path::{Path, PathBuf};

/// Serialize `data` as pretty JSON and write it atomically to `path`.
///
/// Parent directories are created as needed.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, &json)
}

/// Write bytes to `path` through a `.tmp` sibling and a rename.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

/// Read and deserialize a JSON file. A missing file yields `Ok(None)`.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// All `*.json` files directly under `dir`, sorted by file name.
///
/// A missing directory is treated as empty.
pub fn list_json_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        topic: String,
        phases: u32,
    }

    #[test]
    fn test_atomic_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        let entry = Entry {
            topic: "sleep and memory".into(),
            phases: 5,
        };

        atomic_write_json(&path, &entry).unwrap();
        let loaded: Option<Entry> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(entry));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("run.json");
        atomic_write(&path, b"{}").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<Entry> = load_json(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_corrupt_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load_json::<Entry>(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_list_json_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        atomic_write(&dir.path().join("b.json"), b"{}").unwrap();
        atomic_write(&dir.path().join("a.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = list_json_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let files = list_json_files(Path::new("/nonexistent/evidentia/history")).unwrap();
        assert!(files.is_empty());
    }
}
