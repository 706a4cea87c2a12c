//! Cover images as engine-owned, displayable references.
//!
//! A decoded track registers its embedded picture here and receives a
//! [`CoverLease`]. The lease's `cover://<id>` URI can be resolved back to the
//! bytes for as long as the lease is alive; dropping it releases the entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEME: &str = "cover://";

/// Raw picture bytes plus the image format (`"jpeg"`, `"png"`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub data: Arc<[u8]>,
    pub format: String,
}

impl CoverArt {
    pub fn new(data: impl Into<Arc<[u8]>>, format: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            format: format.into(),
        }
    }

    pub fn mime_type(&self) -> String {
        format!("image/{}", self.format.to_ascii_lowercase())
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, CoverArt>>,
}

/// Shared table of live cover references.
#[derive(Clone, Default)]
pub struct CoverRegistry {
    inner: Arc<Inner>,
}

impl CoverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, CoverArt>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, art: CoverArt) -> CoverLease {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries().insert(id, art);
        CoverLease {
            id,
            registry: self.clone(),
        }
    }

    pub fn resolve(&self, uri: &str) -> Option<CoverArt> {
        let id = uri.strip_prefix(SCHEME)?.parse::<u64>().ok()?;
        self.entries().get(&id).cloned()
    }

    /// Number of live references.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, id: u64) {
        self.entries().remove(&id);
    }
}

/// Ownership of one registered cover. Releases the entry on drop.
pub struct CoverLease {
    id: u64,
    registry: CoverRegistry,
}

impl CoverLease {
    pub fn uri(&self) -> String {
        format!("{SCHEME}{}", self.id)
    }
}

impl std::fmt::Debug for CoverLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CoverLease").field(&self.uri()).finish()
    }
}

impl Drop for CoverLease {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
