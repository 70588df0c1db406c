//! Local filesystem storage

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::storage::{DirEntry, Storage, StorageError, StorageResult, StorePath};

/// Storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &StorePath) -> PathBuf {
        let mut full = self.root.clone();
        for segment in path.segments() {
            full.push(segment);
        }
        full
    }
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    if source.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(path.display().to_string())
    } else {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl Storage for LocalStorage {
    fn location(&self, path: &StorePath) -> String {
        self.resolve(path).display().to_string()
    }

    fn exists(&self, path: &StorePath) -> StorageResult<bool> {
        let full = self.resolve(path);
        full.try_exists().map_err(|e| io_error(&full, e))
    }

    fn is_dir(&self, path: &StorePath) -> StorageResult<bool> {
        Ok(self.resolve(path).is_dir())
    }

    fn create_dir_all(&self, path: &StorePath) -> StorageResult<()> {
        let full = self.resolve(path);
        fs::create_dir_all(&full).map_err(|e| io_error(&full, e))
    }

    fn list_dir(&self, path: &StorePath) -> StorageResult<Vec<DirEntry>> {
        let full = self.resolve(path);
        let mut entries = Vec::new();

        for entry in fs::read_dir(&full).map_err(|e| io_error(&full, e))? {
            let entry = entry.map_err(|e| io_error(&full, e))?;
            let file_type = entry.file_type().map_err(|e| io_error(&entry.path(), e))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: file_type.is_dir(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn open_read(&self, path: &StorePath) -> StorageResult<Box<dyn Read + '_>> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|e| io_error(&full, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &StorePath) -> StorageResult<Box<dyn Write + '_>> {
        let full = self.resolve(path);
        let file = File::create(&full).map_err(|e| io_error(&full, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn remove_file(&self, path: &StorePath) -> StorageResult<()> {
        let full = self.resolve(path);
        fs::remove_file(&full).map_err(|e| io_error(&full, e))
    }

    fn remove_dir_all(&self, path: &StorePath) -> StorageResult<()> {
        let full = self.resolve(path);
        fs::remove_dir_all(&full).map_err(|e| io_error(&full, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(storage: &LocalStorage, path: &StorePath, content: &[u8]) {
        let mut writer = storage.open_write(path).unwrap();
        writer.write_all(content).unwrap();
        writer.flush().unwrap();
    }

    #[test]
    fn test_write_then_read() {
        let temp = tempdir().unwrap();
        let storage = LocalStorage::new(temp.path());
        let dir = StorePath::root().join("key").join("v1");
        storage.create_dir_all(&dir).unwrap();

        let file = dir.join("key.json");
        write(&storage, &file, b"{\"a\":1}");

        let mut content = String::new();
        storage
            .open_read(&file)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "{\"a\":1}");
        assert!(temp.path().join("key/v1/key.json").is_file());
    }

    #[test]
    fn test_exists_and_kinds() {
        let temp = tempdir().unwrap();
        let storage = LocalStorage::new(temp.path());
        let dir = StorePath::root().join("d");
        storage.create_dir_all(&dir).unwrap();
        write(&storage, &dir.join("f.json"), b"x");

        assert!(storage.exists(&dir).unwrap());
        assert!(storage.is_dir(&dir).unwrap());
        assert!(!storage.is_file(&dir).unwrap());
        assert!(storage.is_file(&dir.join("f.json")).unwrap());
        assert!(!storage.exists(&dir.join("missing")).unwrap());
    }

    #[test]
    fn test_list_dir_sorted_with_kinds() {
        let temp = tempdir().unwrap();
        let storage = LocalStorage::new(temp.path());
        storage
            .create_dir_all(&StorePath::root().join("b"))
            .unwrap();
        write(&storage, &StorePath::root().join("a.json"), b"{}");

        let entries = storage.list_dir(&StorePath::root()).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "a.json".to_string(),
                    is_dir: false
                },
                DirEntry {
                    name: "b".to_string(),
                    is_dir: true
                },
            ]
        );
    }

    #[test]
    fn test_missing_maps_to_not_found() {
        let temp = tempdir().unwrap();
        let storage = LocalStorage::new(temp.path());
        let missing = StorePath::root().join("nope");

        assert!(storage.open_read(&missing).err().unwrap().is_not_found());
        assert!(storage.list_dir(&missing).unwrap_err().is_not_found());
        assert!(storage.remove_dir_all(&missing).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_file_and_tree() {
        let temp = tempdir().unwrap();
        let storage = LocalStorage::new(temp.path());
        let dir = StorePath::root().join("k").join("v");
        storage.create_dir_all(&dir).unwrap();
        write(&storage, &dir.join("k.json"), b"{}");

        storage.remove_file(&dir.join("k.json")).unwrap();
        assert!(storage.exists(&dir).unwrap());

        storage.remove_dir_all(&StorePath::root().join("k")).unwrap();
        assert!(!temp.path().join("k").exists());
    }

    #[test]
    fn test_location_is_full_path() {
        let storage = LocalStorage::new("/cache");
        let location = storage.location(&StorePath::root().join("k").join("k.json"));
        assert!(location.ends_with("k.json"));
        assert!(location.starts_with("/cache"));
    }
}
