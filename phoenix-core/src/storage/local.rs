/*!
Local filesystem storage adapter implementation.
*/

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::StorageAdapter;
use crate::{PhoenixError, Result};

/// Local filesystem storage adapter
///
/// Each key is stored as `<base_dir>/<key>.json`. Writes go to a temporary
/// file in the same directory which is then renamed over the target, so a
/// reader never observes a half-written envelope.
///
/// # Example
/// ```rust
/// use phoenix_core::storage::{LocalFileStorage, StorageAdapter};
///
/// let dir = tempfile::tempdir()?;
/// let storage = LocalFileStorage::with_base_dir(dir.path());
/// storage.set_item("redux", r#"{"persistedState":{}}"#)?;
/// assert!(storage.get_item("redux")?.is_some());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    /// Create a storage adapter rooted at `base_dir`
    ///
    /// The directory is created on the first write if it does not exist.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the stored files
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve the file backing `key`
    fn resolve_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\', '\0'])
        {
            return Err(PhoenixError::validation(format!(
                "Storage key '{key}' cannot be used as a file name"
            )));
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }

    /// Ensure the base directory exists, creating it if necessary
    fn ensure_base_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir).map_err(|e| {
                PhoenixError::storage(format!(
                    "Failed to create directory {}: {}",
                    self.base_dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

impl StorageAdapter for LocalFileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let full_path = self.resolve_path(key)?;

        match fs::read_to_string(&full_path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PhoenixError::storage(format!(
                "Failed to read {}: {}",
                full_path.display(),
                e
            ))),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let full_path = self.resolve_path(key)?;
        self.ensure_base_dir()?;

        let mut file = NamedTempFile::new_in(&self.base_dir)?;
        file.write_all(value.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&full_path).map_err(|e| {
            PhoenixError::storage(format!(
                "Failed to write {}: {}",
                full_path.display(),
                e.error
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_file_storage_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        assert_eq!(storage.get_item("redux").unwrap(), None);

        storage.set_item("redux", "first").unwrap();
        storage.set_item("redux", "second").unwrap();

        assert_eq!(storage.get_item("redux").unwrap(), Some("second".to_string()));
        assert!(temp_dir.path().join("redux.json").exists());
    }

    #[test]
    fn test_creates_missing_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("state").join("app");
        let storage = LocalFileStorage::with_base_dir(&nested);

        storage.set_item("settings", "{}").unwrap();
        assert_eq!(storage.base_dir(), nested.as_path());
        assert_eq!(storage.get_item("settings").unwrap(), Some("{}".to_string()));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::with_base_dir(temp_dir.path());

        for key in ["", "..", "nested/key", "back\\slash"] {
            assert!(matches!(
                storage.set_item(key, "{}"),
                Err(PhoenixError::Validation(_))
            ));
        }
    }
}
