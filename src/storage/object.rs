//! Object-store storage
//!
//! Maps the directory-shaped `Storage` interface onto a flat key space:
//! `prefix/segment/segment`. Directories are never materialized; a directory
//! exists while at least one object key starts with `<dir>/`.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, RwLock};

use crate::storage::{DirEntry, Storage, StorageError, StorageResult, StorePath};

/// Minimal object-store client: whole-object get/put/delete and prefix listing
pub trait ObjectClient: fmt::Debug + Send + Sync {
    fn get_object(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    fn put_object(&self, key: &str, body: Vec<u8>) -> StorageResult<()>;

    fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// All object keys starting with `prefix`
    fn list_objects(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Object client keeping everything in process memory
#[derive(Debug, Default)]
pub struct MemoryObjectClient {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned() -> StorageError {
    StorageError::Backend("memory object store lock poisoned".to_string())
}

impl ObjectClient for MemoryObjectClient {
    fn get_object(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.get(key).cloned())
    }

    fn put_object(&self, key: &str, body: Vec<u8>) -> StorageResult<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    fn delete_object(&self, key: &str) -> StorageResult<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects.remove(key);
        Ok(())
    }

    fn list_objects(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

/// Storage rooted at a prefix inside an object store
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    client: Arc<dyn ObjectClient>,
    prefix: String,
    display: String,
}

impl ObjectStorage {
    /// `display` is the URI shown in logs, e.g. `s3://bucket/prefix`
    pub fn new(
        client: Arc<dyn ObjectClient>,
        prefix: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        Self {
            client,
            prefix: prefix.into().trim_matches('/').to_string(),
            display: display.into(),
        }
    }

    fn object_key(&self, path: &StorePath) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.prefix.is_empty() {
            parts.push(&self.prefix);
        }
        parts.extend(path.segments().iter().map(String::as_str));
        parts.join("/")
    }

    fn dir_prefix(&self, path: &StorePath) -> String {
        let key = self.object_key(path);
        if key.is_empty() {
            key
        } else {
            format!("{}/", key)
        }
    }
}

impl Storage for ObjectStorage {
    fn location(&self, path: &StorePath) -> String {
        if path.is_root() {
            self.display.clone()
        } else {
            format!("{}/{}", self.display.trim_end_matches('/'), path)
        }
    }

    fn exists(&self, path: &StorePath) -> StorageResult<bool> {
        if !path.is_root() && self.client.get_object(&self.object_key(path))?.is_some() {
            return Ok(true);
        }
        self.is_dir(path)
    }

    fn is_dir(&self, path: &StorePath) -> StorageResult<bool> {
        Ok(!self.client.list_objects(&self.dir_prefix(path))?.is_empty())
    }

    fn create_dir_all(&self, _path: &StorePath) -> StorageResult<()> {
        Ok(())
    }

    fn list_dir(&self, path: &StorePath) -> StorageResult<Vec<DirEntry>> {
        let dir_prefix = self.dir_prefix(path);
        let keys = self.client.list_objects(&dir_prefix)?;
        if keys.is_empty() {
            return Err(StorageError::NotFound(self.location(path)));
        }

        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        for key in keys {
            let rest = &key[dir_prefix.len()..];
            match rest.split_once('/') {
                Some((name, _)) => {
                    children.insert(name.to_string(), true);
                }
                None => {
                    children.entry(rest.to_string()).or_insert(false);
                }
            }
        }

        Ok(children
            .into_iter()
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    fn open_read(&self, path: &StorePath) -> StorageResult<Box<dyn Read + '_>> {
        match self.client.get_object(&self.object_key(path))? {
            Some(body) => Ok(Box::new(Cursor::new(body))),
            None => Err(StorageError::NotFound(self.location(path))),
        }
    }

    fn open_write(&self, path: &StorePath) -> StorageResult<Box<dyn Write + '_>> {
        Ok(Box::new(ObjectWriter {
            client: self.client.as_ref(),
            key: self.object_key(path),
            buffer: Vec::new(),
            dirty: true,
        }))
    }

    fn remove_file(&self, path: &StorePath) -> StorageResult<()> {
        let key = self.object_key(path);
        if self.client.get_object(&key)?.is_none() {
            return Err(StorageError::NotFound(self.location(path)));
        }
        self.client.delete_object(&key)
    }

    fn remove_dir_all(&self, path: &StorePath) -> StorageResult<()> {
        let keys = self.client.list_objects(&self.dir_prefix(path))?;
        if keys.is_empty() {
            return Err(StorageError::NotFound(self.location(path)));
        }
        for key in keys {
            self.client.delete_object(&key)?;
        }
        Ok(())
    }
}

/// Buffers writes and uploads the whole object on flush
struct ObjectWriter<'a> {
    client: &'a dyn ObjectClient,
    key: String,
    buffer: Vec<u8>,
    dirty: bool,
}

impl ObjectWriter<'_> {
    fn upload(&mut self) -> StorageResult<()> {
        self.client.put_object(&self.key, self.buffer.clone())?;
        self.dirty = false;
        Ok(())
    }
}

impl Write for ObjectWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.dirty = true;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.upload().map_err(io::Error::other)
    }
}

impl Drop for ObjectWriter<'_> {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(error) = self.upload() {
                tracing::warn!(key = %self.key, %error, "object upload on drop failed");
            }
        }
    }
}
