//! JSON file helpers shared by the wallet file and the address registry.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error_handler::{DemoError, Result};

/// Read and parse `path`, or `None` when the file does not exist.
pub fn read_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DemoError::Io(e)),
    }
}

/// Replace `path` with the pretty-printed JSON of `value`.
///
/// The document is written to a temporary file in the same directory and
/// renamed over the target, so readers see either the old or the new file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| DemoError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_file_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded: Option<BTreeMap<String, String>> =
            read_json_if_exists(&tmp.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn write_replaces_existing_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");

        let mut first = BTreeMap::new();
        first.insert("a".to_string(), "1".to_string());
        write_json_atomic(&path, &first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("b".to_string(), "2".to_string());
        write_json_atomic(&path, &second).unwrap();

        let loaded: BTreeMap<String, String> = read_json_if_exists(&path).unwrap().unwrap();
        assert_eq!(loaded, second);

        // No temporary files left behind.
        let entries = std::fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn write_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("doc.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result: Result<Option<Vec<u8>>> = read_json_if_exists(&path);
        assert!(matches!(result, Err(DemoError::Json(_))));
    }
}
