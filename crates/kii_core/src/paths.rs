use std::env;
use std::path::{Path, PathBuf};

use crate::error_handler::{DemoError, Result};

/// Directory whose presence marks the project root.
pub const ROOT_MARKER: &str = "contracts";

/// Explicit project root, checked before walking up from the working directory.
pub const ROOT_ENV_VAR: &str = "KII_DEMO_ROOT";

/// Resolve the project root: `KII_DEMO_ROOT` when set, otherwise the closest
/// ancestor of the working directory that contains [`ROOT_MARKER`].
pub fn get_root_path() -> Result<PathBuf> {
    if let Ok(explicit) = env::var(ROOT_ENV_VAR) {
        if !explicit.trim().is_empty() {
            let root = PathBuf::from(explicit);
            if !root.is_dir() {
                return Err(DemoError::Config(format!(
                    "{ROOT_ENV_VAR} points to {}, which is not a directory",
                    root.display()
                )));
            }
            return Ok(root);
        }
    }
    let cwd = env::current_dir()?;
    find_root_from(&cwd)
}

pub fn find_root_from(start: &Path) -> Result<PathBuf> {
    find_root_with(start, ROOT_MARKER)
}

/// Walk `start` and its parents until one contains `marker`.
pub fn find_root_with(start: &Path, marker: &str) -> Result<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            DemoError::NotFound(format!(
                "The root path of the project could not be found from {}",
                start.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MARKER: &str = "kii-root-marker-for-tests";

    #[test]
    fn finds_marker_from_nested_directory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(MARKER)).unwrap();
        let nested = tmp.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        let root = find_root_with(&nested, MARKER).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn finds_marker_in_start_directory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(MARKER)).unwrap();

        assert_eq!(find_root_with(tmp.path(), MARKER).unwrap(), tmp.path());
    }

    #[test]
    fn closest_marker_wins() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(MARKER)).unwrap();
        let inner = tmp.path().join("inner");
        fs::create_dir_all(inner.join(MARKER)).unwrap();
        let start = inner.join("deeper");
        fs::create_dir_all(&start).unwrap();

        assert_eq!(find_root_with(&start, MARKER).unwrap(), inner);
    }

    #[test]
    fn missing_marker_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = find_root_with(tmp.path(), "no-such-marker-anywhere-8f2c").unwrap_err();
        assert!(matches!(err, DemoError::NotFound(_)));
    }
}
