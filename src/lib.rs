//! photo-uploader - A small HTTP API over an object storage bucket of photos
//!
//! This crate provides:
//! - Listing, fetching, uploading and deleting photos with one storage call per request
//! - Swappable object storage backends (Google Cloud Storage, local filesystem)
//! - Content-type checks on upload and content-type resolution on download

pub mod api;
pub mod config;
pub mod media;
pub mod object_store;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub object_store: Arc<dyn object_store::ObjectStore>,
}
