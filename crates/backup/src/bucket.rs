//! Blob storage for export documents, uploaded sources, and attachment bytes.
//!
//! Keys are relative, `/`-separated paths such as
//! `exports/export_7_20250301T120000Z.xml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Object storage addressed by relative keys.
#[async_trait]
pub trait Bucket: Send + Sync {
    async fn read(&self, key: &str) -> Result<Vec<u8>, BucketError>;
    /// Create or overwrite the object at `key`.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BucketError>;
    async fn delete(&self, key: &str) -> Result<(), BucketError>;
    async fn exists(&self, key: &str) -> Result<bool, BucketError>;
}

/// Reject keys that could escape the bucket root.
fn check_key(key: &str) -> Result<(), BucketError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(BucketError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Bucket rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FileBucket {
    root: PathBuf,
}

impl FileBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, BucketError> {
        check_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, seg| path.join(seg)))
    }
}

fn io_error(key: &str, source: std::io::Error) -> BucketError {
    if source.kind() == std::io::ErrorKind::NotFound {
        BucketError::NotFound(key.to_string())
    } else {
        BucketError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl Bucket for FileBucket {
    async fn read(&self, key: &str) -> Result<Vec<u8>, BucketError> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|e| io_error(key, e))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BucketError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(key, e))?;
        }
        // Write aside and rename so readers never observe a partial object.
        let mut tmp = path.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error(key, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), BucketError> {
        let path = self.resolve(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_error(key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        let path = self.resolve(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(key, e))
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Bucket holding objects in process memory.
#[derive(Debug, Default)]
pub struct MemoryBucket {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored key in lexical order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    async fn read(&self, key: &str) -> Result<Vec<u8>, BucketError> {
        check_key(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BucketError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BucketError> {
        check_key(key)?;
        self.objects
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BucketError> {
        check_key(key)?;
        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(BucketError::NotFound(key.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        check_key(key)?;
        Ok(self.objects.read().await.contains_key(key))
    }
}
