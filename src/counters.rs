use crate::error::{DedupeError, Result};
use crate::store::StoreHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CounterKind {
    Total,
    Crawled,
}

impl CounterKind {
    fn key(self, site: &str) -> Result<String> {
        if site.is_empty() {
            return Err(DedupeError::InvalidInput(
                "site must not be empty".into(),
            ));
        }
        Ok(match self {
            CounterKind::Total => format!("total_pages_{site}"),
            CounterKind::Crawled => format!("crawled_pages_{site}"),
        })
    }
}

/// Per-site page counters.
///
/// `set_*` overwrite blindly: two workers doing read-modify-write race and
/// the later write wins, which can move `crawled` backwards. Prefer the
/// `incr_*` methods, which are a single atomic store increment.
#[derive(Clone)]
pub struct ProgressCounters {
    store: StoreHandle,
}

impl ProgressCounters {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub fn set_total(&self, site: &str, pages: u64) -> Result<()> {
        self.set(CounterKind::Total, site, pages)
    }

    pub fn get_total(&self, site: &str) -> Result<Option<u64>> {
        self.get(CounterKind::Total, site)
    }

    pub fn incr_total(&self, site: &str, delta: i64) -> Result<u64> {
        self.incr(CounterKind::Total, site, delta)
    }

    pub fn set_crawled(&self, site: &str, pages: u64) -> Result<()> {
        self.set(CounterKind::Crawled, site, pages)
    }

    pub fn get_crawled(&self, site: &str) -> Result<Option<u64>> {
        self.get(CounterKind::Crawled, site)
    }

    pub fn incr_crawled(&self, site: &str, delta: i64) -> Result<u64> {
        self.incr(CounterKind::Crawled, site, delta)
    }

    fn set(&self, kind: CounterKind, site: &str, pages: u64) -> Result<()> {
        let key = kind.key(site)?;
        self.store.set_scalar(&key, &pages.to_string())
    }

    fn get(&self, kind: CounterKind, site: &str) -> Result<Option<u64>> {
        let key = kind.key(site)?;
        match self.store.get_scalar(&key)? {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| DedupeError::CorruptValue { key, value }),
            None => Ok(None),
        }
    }

    fn incr(&self, kind: CounterKind, site: &str, delta: i64) -> Result<u64> {
        let key = kind.key(site)?;
        let next = self.store.incr_scalar(&key, delta)?;
        u64::try_from(next).map_err(|_| DedupeError::CorruptValue {
            key,
            value: next.to_string(),
        })
    }
}
