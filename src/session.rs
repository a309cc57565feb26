use crate::error::{DedupeError, Result};
use crate::store::{SessionRecord, StoreHandle};
use std::time::Duration;
use tracing::{debug, warn};

fn cookie_key(source: &str) -> Result<String> {
    if source.is_empty() {
        return Err(DedupeError::InvalidInput(
            "source id must not be empty".into(),
        ));
    }
    Ok(format!("{source}_cookie"))
}

/// Expiry for `ttl_secs`: none when not positive, and an error when the
/// millisecond value the store expires by does not fit in an `i64`.
fn cookie_ttl(ttl_secs: i64) -> Result<Option<Duration>> {
    if ttl_secs <= 0 {
        return Ok(None);
    }
    if ttl_secs.checked_mul(1000).is_none() {
        return Err(DedupeError::InvalidInput(format!(
            "cookie ttl of {ttl_secs}s is out of range"
        )));
    }
    Ok(Some(Duration::from_secs(ttl_secs.unsigned_abs())))
}

/// Per-source cookie records.
///
/// Writes replace the whole record in one atomic batch. A failed write is
/// not fatal to a crawl (the spider can log in again), so [`set`] only
/// logs it; use [`try_set`] to observe the error.
///
/// [`set`]: SessionStore::set
/// [`try_set`]: SessionStore::try_set
#[derive(Clone)]
pub struct SessionStore {
    store: StoreHandle,
}

impl SessionStore {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Replaces the record for `source`. A positive `ttl_secs` makes it
    /// expire; zero or negative keeps it until overwritten.
    pub fn try_set(
        &self,
        source: &str,
        record: &SessionRecord,
        ttl_secs: i64,
    ) -> Result<()> {
        let key = cookie_key(source)?;
        let ttl = cookie_ttl(ttl_secs)?;
        self.store.write_record(&key, record, ttl)?;
        debug!(source, fields = record.len(), ?ttl, "stored cookies");
        Ok(())
    }

    /// Log-and-continue variant of [`try_set`](Self::try_set). Returns
    /// whether the record was written.
    pub fn set(
        &self,
        source: &str,
        record: &SessionRecord,
        ttl_secs: i64,
    ) -> bool {
        match self.try_set(source, record, ttl_secs) {
            Ok(()) => true,
            Err(e) => {
                warn!(source, error = %e, "failed to store cookies");
                false
            }
        }
    }

    /// Current record for `source`; empty when none exists or it expired.
    pub fn get(&self, source: &str) -> Result<SessionRecord> {
        let key = cookie_key(source)?;
        self.store.read_record(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn record(pairs: &[(&str, &str)]) -> SessionRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_set_then_get() {
        let sessions = SessionStore::new(InMemoryStore::new().into_handle());
        let cookies = record(&[("a", "1"), ("b", "2")]);
        assert!(sessions.set("siteA", &cookies, 0));
        assert_eq!(sessions.get("siteA").unwrap(), cookies);
        assert!(sessions.get("siteB").unwrap().is_empty());
    }

    #[test]
    fn test_negative_ttl_means_no_expiry() {
        let sessions = SessionStore::new(InMemoryStore::new().into_handle());
        let cookies = record(&[("sid", "x")]);
        sessions.try_set("siteA", &cookies, -1).unwrap();
        assert_eq!(sessions.get("siteA").unwrap(), cookies);
    }

    #[test]
    fn test_out_of_range_ttl_is_not_fatal() {
        let sessions = SessionStore::new(InMemoryStore::new().into_handle());
        let cookies = record(&[("a", "1")]);
        assert!(!sessions.set("siteA", &cookies, i64::MAX));
        assert!(matches!(
            sessions.try_set("siteA", &cookies, i64::MAX / 999),
            Err(DedupeError::InvalidInput(_))
        ));
        assert!(sessions.get("siteA").unwrap().is_empty());

        // Largest accepted ttl still stores the record
        assert!(sessions.set("siteA", &cookies, i64::MAX / 1000));
        assert_eq!(sessions.get("siteA").unwrap(), cookies);
    }

    #[test]
    fn test_empty_source_is_rejected_but_not_fatal() {
        let sessions = SessionStore::new(InMemoryStore::new().into_handle());
        let cookies = record(&[("sid", "x")]);
        assert!(matches!(
            sessions.try_set("", &cookies, 0),
            Err(DedupeError::InvalidInput(_))
        ));
        assert!(!sessions.set("", &cookies, 0));
        assert!(sessions.get("").is_err());
    }
}
