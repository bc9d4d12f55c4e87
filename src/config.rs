use std::path::Path;

use thiserror::Error;

/// Key file looked up next to the binary when `CREDENTIALS_FILE` is unset.
pub const DEFAULT_CREDENTIALS_FILE: &str = "keys.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket name; also the first segment of upload pathnames
    pub bucket: String,
    /// Path to a GCS service account JSON (falls back to the metadata server)
    pub credentials_file: Option<String>,
    /// Directory for local storage backend
    pub local_storage_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "local".to_string(),
            credentials_file: None,
            local_storage_path: "./photos".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let max_upload_size = lookup("MAX_UPLOAD_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let backend = match lookup("STORAGE_BACKEND")
            .unwrap_or_else(|| "gcs".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => StorageBackend::Local,
            _ => StorageBackend::Gcs,
        };

        let bucket = lookup("BUCKET_NAME")
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());
        let bucket = match (&backend, bucket) {
            (_, Some(b)) => b,
            (StorageBackend::Local, None) => "local".to_string(),
            (StorageBackend::Gcs, None) => String::new(),
        };

        let credentials_file = lookup("CREDENTIALS_FILE").or_else(|| {
            Path::new(DEFAULT_CREDENTIALS_FILE)
                .exists()
                .then(|| DEFAULT_CREDENTIALS_FILE.to_string())
        });

        let local_storage_path =
            lookup("LOCAL_STORAGE_PATH").unwrap_or_else(|| "./photos".to_string());

        let config = Config {
            bind_address,
            storage: StorageConfig {
                backend,
                bucket,
                credentials_file,
                local_storage_path,
            },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Gcs && self.storage.bucket.is_empty() {
            return Err(ConfigError::ValidationError(
                "BUCKET_NAME is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
