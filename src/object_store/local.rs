use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::{ObjectStore, ObjectStoreError, StoredObject};

/// Suffix of the sidecar file holding an object's content type.
const CONTENT_TYPE_SUFFIX: &str = ".content-type";

/// Local filesystem object store for development and testing.
/// Objects live flat in `base_path`; each may have a `<key>.content-type` sidecar.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\'])
            || key.ends_with(CONTENT_TYPE_SUFFIX)
        {
            return Err(ObjectStoreError::Backend(format!(
                "invalid object name: {key:?}"
            )));
        }
        Ok(self.base_path.join(key))
    }

    fn content_type_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(CONTENT_TYPE_SUFFIX);
        PathBuf::from(name)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(CONTENT_TYPE_SUFFIX) || !name.starts_with(prefix) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        let path = self.object_path(key)?;
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| ObjectStoreError::Read(e.to_string()))?;

        let content_type = tokio::fs::read_to_string(Self::content_type_path(&path))
            .await
            .ok()
            .map(|ct| ct.trim().to_string())
            .filter(|ct| !ct.is_empty());

        Ok(StoredObject {
            data: Bytes::from(data),
            content_type,
        })
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        tokio::fs::write(&path, &data).await?;

        // An object is only visible together with its content type
        if let Err(e) = tokio::fs::write(Self::content_type_path(&path), content_type).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        tokio::fs::remove_file(&path).await?;

        let sidecar = Self::content_type_path(&path);
        if sidecar.exists() {
            tokio::fs::remove_file(&sidecar).await?;
        }
        Ok(())
    }
}
