//! Shared test helpers for photo-uploader router tests.

use std::sync::Arc;

use crate::config::{Config, StorageConfig};
use crate::object_store::LocalStore;
use crate::AppState;

pub const MULTIPART_BOUNDARY: &str = "photo-uploader-test-boundary";

/// Create a test AppState backed by a local object store under `temp_dir/files`.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        bind_address: "127.0.0.1:0".to_string(),
        storage: StorageConfig {
            local_storage_path: files_dir.to_string_lossy().to_string(),
            ..StorageConfig::default()
        },
        max_upload_size: 64 * 1024, // 64KB for tests
    };

    let object_store = LocalStore::new(&files_dir).expect("Failed to create test object store");

    Arc::new(AppState {
        config,
        object_store: Arc::new(object_store),
    })
}

/// Encode a single-part `multipart/form-data` body using [`MULTIPART_BOUNDARY`].
pub fn multipart_body(
    field: &str,
    file_name: &str,
    content_type: Option<&str>,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}
