use crate::error::{DedupeError, Result};
use crate::store::StoreHandle;
use tracing::debug;

fn set_key(source: &str) -> Result<String> {
    if source.is_empty() {
        return Err(DedupeError::InvalidInput(
            "source id must not be empty".into(),
        ));
    }
    Ok(format!("{source}:dupefilter"))
}

/// Exact per-source fingerprint set, shared with the crawl frontier's
/// request dupefilter. Unlike the Bloom filters, members can be removed.
#[derive(Clone)]
pub struct ExactFingerprintSet {
    store: StoreHandle,
}

impl ExactFingerprintSet {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Returns true when the fingerprint was newly added.
    pub fn insert(&self, source: &str, fingerprint: &str) -> Result<bool> {
        let key = set_key(source)?;
        self.store.set_add(&key, fingerprint)
    }

    pub fn contains(&self, source: &str, fingerprint: &str) -> Result<bool> {
        let key = set_key(source)?;
        self.store.set_contains(&key, fingerprint)
    }

    /// Forgets `fingerprint` so the item is crawled again. Removing an
    /// absent member returns `Ok(false)`.
    pub fn remove(&self, source: &str, fingerprint: &str) -> Result<bool> {
        let key = set_key(source)?;
        let removed = self.store.set_remove(&key, fingerprint)?;
        debug!(source, fingerprint, removed, "removed from dupefilter");
        Ok(removed)
    }
}
