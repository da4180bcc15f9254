// Document storage backends.
//
// Backends are synchronous; the pipeline wraps every call in
// `spawn_blocking`. Paths handed to a backend are already normalized
// workdir-relative strings (see `redline_common::path`).

pub mod audit;
pub mod http;
pub mod local;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{DaemonConfig, StorageBackendKind};
use crate::errors::OpError;

pub use http::HttpStorage;
pub use local::LocalStorage;

/// Backend contract for loading and saving whole documents.
pub trait DocumentStorage: Send + Sync {
    /// Read the full text of a document.
    fn load(&self, path: &str) -> Result<String, OpError>;

    /// Overwrite a document with new content. Must either fully succeed
    /// or leave the previous content readable.
    fn save(&self, path: &str, content: &str) -> Result<(), OpError>;

    fn exists(&self, path: &str) -> Result<bool, OpError>;
}

/// Build the backend the configuration selects.
pub fn storage_from_config(config: &DaemonConfig) -> Result<Arc<dyn DocumentStorage>> {
    match config.storage.backend {
        StorageBackendKind::Local => {
            let root = config.document_root().context("failed to resolve document root")?;
            let storage = LocalStorage::new(root, config.documents.autobackup)
                .context("failed to initialize local storage")?;
            Ok(Arc::new(storage))
        }
        StorageBackendKind::Http => {
            let base_url = config
                .storage
                .http_base_url
                .as_deref()
                .context("http storage backend selected but no base URL configured")?;
            let storage =
                HttpStorage::new(base_url, config.storage.http_bearer_token.clone())
                    .context("failed to initialize http storage")?;
            Ok(Arc::new(storage))
        }
    }
}
