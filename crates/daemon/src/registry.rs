// Handle registry: the process-wide table of open document handles.
//
// Handles are opaque UUIDs minted at registration. The registry keys by
// canonical path as well, so opening the same document twice returns the
// original handle instead of minting a second identity for it.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use redline_common::types::HandleInfo;
use tracing::debug;
use uuid::Uuid;

use crate::errors::OpError;

#[derive(Default)]
struct RegistryInner {
    by_id: HashMap<Uuid, HandleInfo>,
    by_path: HashMap<String, Uuid>,
    /// Registration order, for stable listing.
    order: Vec<Uuid>,
}

#[derive(Default)]
pub struct HandleRegistry {
    inner: Mutex<RegistryInner>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canonical path, returning the existing handle when the
    /// document is already open.
    pub fn register(&self, path: &str) -> HandleInfo {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();

        if let Some(existing_id) = inner.by_path.get(path).copied() {
            if let Some(info) = inner.by_id.get_mut(&existing_id) {
                info.last_used_at = now;
                return info.clone();
            }
        }

        let info = HandleInfo {
            handle_id: Uuid::new_v4(),
            path: path.to_string(),
            opened_at: now,
            last_used_at: now,
        };
        inner.by_path.insert(path.to_string(), info.handle_id);
        inner.order.push(info.handle_id);
        inner.by_id.insert(info.handle_id, info.clone());
        debug!(handle_id = %info.handle_id, path, "registered document handle");
        info
    }

    /// Look up a handle and refresh its last-used timestamp.
    pub fn lookup(&self, handle_id: Uuid) -> Result<HandleInfo, OpError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.by_id.get_mut(&handle_id) {
            Some(info) => {
                info.last_used_at = Utc::now();
                Ok(info.clone())
            }
            None => Err(OpError::HandleNotFound { handle_id }),
        }
    }

    /// Close a handle. Subsequent lookups fail with `HANDLE_NOT_FOUND`.
    pub fn close(&self, handle_id: Uuid) -> Result<HandleInfo, OpError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let info = inner
            .by_id
            .remove(&handle_id)
            .ok_or(OpError::HandleNotFound { handle_id })?;
        inner.by_path.remove(&info.path);
        inner.order.retain(|id| *id != handle_id);
        debug!(handle_id = %handle_id, path = %info.path, "closed document handle");
        Ok(info)
    }

    /// All open handles in registration order.
    pub fn list(&self) -> Vec<HandleInfo> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.order.iter().filter_map(|id| inner.by_id.get(id).cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup() {
        let registry = HandleRegistry::new();
        let info = registry.register("docs/a.txt");
        let found = registry.lookup(info.handle_id).expect("lookup should succeed");
        assert_eq!(found.path, "docs/a.txt");
        assert_eq!(found.handle_id, info.handle_id);
    }

    #[test]
    fn same_path_returns_same_handle() {
        let registry = HandleRegistry::new();
        let first = registry.register("docs/a.txt");
        let second = registry.register("docs/a.txt");
        assert_eq!(first.handle_id, second.handle_id);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn close_then_lookup_fails() {
        let registry = HandleRegistry::new();
        let info = registry.register("docs/a.txt");
        registry.close(info.handle_id).expect("close should succeed");

        let error = registry.lookup(info.handle_id).expect_err("lookup should fail");
        assert_eq!(error.code(), "HANDLE_NOT_FOUND");
    }

    #[test]
    fn close_unknown_handle_fails() {
        let registry = HandleRegistry::new();
        let error = registry.close(Uuid::new_v4()).expect_err("close should fail");
        assert_eq!(error.code(), "HANDLE_NOT_FOUND");
    }

    #[test]
    fn list_preserves_registration_order() {
        let registry = HandleRegistry::new();
        let a = registry.register("a.txt");
        let b = registry.register("b.txt");
        let c = registry.register("c.txt");

        registry.close(b.handle_id).expect("close should succeed");
        let d = registry.register("d.txt");

        let listed: Vec<_> = registry.list().into_iter().map(|h| h.handle_id).collect();
        assert_eq!(listed, vec![a.handle_id, c.handle_id, d.handle_id]);
    }

    #[test]
    fn reopening_after_close_mints_a_new_handle() {
        let registry = HandleRegistry::new();
        let first = registry.register("a.txt");
        registry.close(first.handle_id).expect("close should succeed");
        let second = registry.register("a.txt");
        assert_ne!(first.handle_id, second.handle_id);
    }
}
