//! JSON state files.
//!
//! A missing file loads as the type's default. A file that exists but cannot
//! be read or parsed is an error: callers must stop before writing anything so
//! the operator can inspect it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PersistenceError;

/// Load a JSON state file, or `T::default()` if it does not exist yet.
pub fn load_json<T>(path: &Path) -> Result<T, PersistenceError>
where
    T: DeserializeOwned + Default,
{
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "State file missing, starting empty");
            return Ok(T::default());
        }
        Err(e) => return Err(PersistenceError::read(path, e)),
    };

    if contents.trim().is_empty() {
        return Err(PersistenceError::corrupt(path, "file is empty"));
    }

    serde_json::from_str(&contents).map_err(|e| PersistenceError::corrupt(path, e.to_string()))
}

/// Write a JSON state file so that readers only ever see the old or the new
/// content: the new content goes to a sibling `.tmp` file which is then
/// renamed over the target.
pub fn save_json_atomic<T>(path: &Path, value: &T) -> Result<(), PersistenceError>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::write(parent, e))?;
        }
    }

    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| PersistenceError::corrupt(path, format!("serialize failed: {}", e)))?;

    let tmp = tmp_path(path);
    fs::write(&tmp, contents).map_err(|e| PersistenceError::write(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        PersistenceError::write(path, e)
    })?;

    tracing::debug!(path = %path.display(), "Saved state file");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: BTreeMap<String, u32> = load_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut value = BTreeMap::new();
        value.insert("KBOS".to_string(), 3u32);

        save_json_atomic(&path, &value).unwrap();
        let loaded: BTreeMap<String, u32> = load_json(&path).unwrap();

        assert_eq!(loaded, value);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<BTreeMap<String, u32>, _> = load_json(&path);
        assert!(matches!(result, Err(PersistenceError::Corrupt { .. })));
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "  \n").unwrap();

        let result: Result<BTreeMap<String, u32>, _> = load_json(&path);
        assert!(matches!(result, Err(PersistenceError::Corrupt { .. })));
    }
}
