// Locator resolution: turn whatever a client names a document by into a
// canonical workdir-relative path, then into a handle.
//
// Accepted shapes: `{"path": ...}` relative or absolute, `{"uri": ...}`
// file or http(s), `{"handle_id": ...}` for an already-open document.
// Path and uri locators auto-register; the registry dedups by canonical
// path so repeated opens converge on one handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redline_common::path::normalize_document_path;
use redline_common::types::HandleInfo;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::errors::OpError;
use crate::registry::HandleRegistry;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Locator {
    Handle { handle_id: Uuid },
    Remote { uri: String },
    Path { path: String },
}

pub struct LocatorResolver {
    registry: Arc<HandleRegistry>,
    root: PathBuf,
    http_base: Option<Url>,
}

impl LocatorResolver {
    pub fn new(registry: Arc<HandleRegistry>, root: PathBuf, http_base: Option<Url>) -> Self {
        Self { registry, root, http_base }
    }

    /// Resolve a locator to a live handle, registering path and uri forms.
    pub fn resolve(&self, locator: &Locator) -> Result<HandleInfo, OpError> {
        match locator {
            Locator::Handle { handle_id } => self.registry.lookup(*handle_id),
            Locator::Path { path } => {
                let canonical = self.canonicalize_path(path)?;
                Ok(self.registry.register(&canonical))
            }
            Locator::Remote { uri } => {
                let canonical = self.canonicalize_uri(uri)?;
                Ok(self.registry.register(&canonical))
            }
        }
    }

    /// Canonical form of a path locator. Absolute paths must sit under the
    /// document root; relative paths are taken as root-relative.
    fn canonicalize_path(&self, path: &str) -> Result<String, OpError> {
        if Path::new(path).is_absolute() {
            let relative = Path::new(path)
                .strip_prefix(&self.root)
                .map_err(|_| OpError::PathEscapesRoot { path: path.to_string() })?;
            let relative = relative
                .to_str()
                .ok_or_else(|| OpError::InvalidLocator("path is not valid UTF-8".to_string()))?;
            Ok(normalize_document_path(relative)?)
        } else {
            Ok(normalize_document_path(path)?)
        }
    }

    fn canonicalize_uri(&self, uri: &str) -> Result<String, OpError> {
        let url = Url::parse(uri)
            .map_err(|error| OpError::InvalidLocator(format!("invalid uri `{uri}`: {error}")))?;

        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| OpError::InvalidLocator(format!("invalid file uri `{uri}`")))?;
                let path = path.to_str().ok_or_else(|| {
                    OpError::InvalidLocator("file uri path is not valid UTF-8".to_string())
                })?;
                self.canonicalize_path(path)
            }
            "http" | "https" => {
                let base = self.http_base.as_ref().ok_or_else(|| {
                    OpError::InvalidLocator(
                        "http uri locators require the http storage backend".to_string(),
                    )
                })?;
                let relative = base.make_relative(&url).ok_or_else(|| {
                    OpError::PathEscapesRoot { path: uri.to_string() }
                })?;
                if relative.starts_with("..") {
                    return Err(OpError::PathEscapesRoot { path: uri.to_string() });
                }
                Ok(normalize_document_path(&relative)?)
            }
            other => {
                Err(OpError::InvalidLocator(format!("unsupported uri scheme `{other}`")))
            }
        }
    }
}
