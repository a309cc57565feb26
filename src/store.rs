use crate::error::{DedupeError, Result};
use bitvec::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Field/value pairs stored under one record key.
pub type SessionRecord = HashMap<String, String>;

/// Process-wide handle to the shared store, built once at startup and
/// handed to every component constructor.
pub type StoreHandle = Arc<dyn SharedStore>;

/// Largest addressable bit array (Redis caps strings at 512 MB).
pub const MAX_BIT_ARRAY_SIZE: u64 = 1 << 32;

/// Operations the dedupe layer needs from the external key-value /
/// bit-array service.
///
/// Every method is a single store command unless noted, so concurrent
/// callers in other processes observe each one atomically.
pub trait SharedStore: Send + Sync {
    /// Sets every bit in `indices` to 1. Each bit is its own atomic
    /// command; the batch as a whole is not transactional.
    fn set_bits(&self, key: &str, indices: &[u64]) -> Result<()>;
    /// Reads the bits at `indices`; bits never written read as 0.
    fn get_bits(&self, key: &str, indices: &[u64]) -> Result<Vec<bool>>;

    /// Replaces the whole record under `key` and applies `ttl`, as one
    /// atomic batch. An empty record deletes the key.
    fn write_record(
        &self,
        key: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<()>;
    /// Returns the full record, empty when absent or expired.
    fn read_record(&self, key: &str) -> Result<SessionRecord>;

    /// Returns true when `member` was not already present.
    fn set_add(&self, key: &str, member: &str) -> Result<bool>;
    /// Returns true when `member` was present and got removed.
    fn set_remove(&self, key: &str, member: &str) -> Result<bool>;
    fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    fn set_scalar(&self, key: &str, value: &str) -> Result<()>;
    fn get_scalar(&self, key: &str) -> Result<Option<String>>;
    /// Atomically adds `delta` to an integer scalar (missing counts as 0)
    /// and returns the new value.
    fn incr_scalar(&self, key: &str, delta: i64) -> Result<i64>;
}

enum Value {
    Bits(BitVec<u8, Msb0>),
    Record(SessionRecord),
    Set(HashSet<String>),
    Scalar(String),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Bits(_) => "bit array",
            Value::Record(_) => "record",
            Value::Set(_) => "set",
            Value::Scalar(_) => "scalar",
        }
    }
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn persistent(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> DedupeError {
    DedupeError::StorageError(format!(
        "key '{key}' holds a {}, expected a {expected}",
        found.kind()
    ))
}

fn check_index(index: u64) -> Result<()> {
    if index >= MAX_BIT_ARRAY_SIZE {
        return Err(DedupeError::IndexOutOfBounds {
            index,
            capacity: MAX_BIT_ARRAY_SIZE,
        });
    }
    Ok(())
}

/// Process-local store with the same semantics as the shared one.
///
/// Bit arrays grow on demand up to the highest bit set, like Redis strings.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_handle(self) -> StoreHandle {
        Arc::new(self)
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize> {
        let entries = self.read_entries()?;
        let now = Instant::now();
        Ok(entries.values().filter(|e| !e.is_expired(now)).count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.entries.read().map_err(|_| {
            DedupeError::LockError("Failed to read store entries".to_string())
        })
    }

    fn write_entries(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        let mut entries = self.entries.write().map_err(|_| {
            DedupeError::LockError("Failed to write store entries".to_string())
        })?;
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(entries)
    }

    /// Runs `f` on the live value under `key`, or returns `None`.
    fn with_live<T>(
        &self,
        key: &str,
        f: impl FnOnce(&Value) -> Result<T>,
    ) -> Result<Option<T>> {
        let entries = self.read_entries()?;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => {
                f(&entry.value).map(Some)
            }
            _ => Ok(None),
        }
    }
}

impl SharedStore for InMemoryStore {
    fn set_bits(&self, key: &str, indices: &[u64]) -> Result<()> {
        // Check all indices first
        for &index in indices {
            check_index(index)?;
        }

        let mut entries = self.write_entries()?;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::Bits(BitVec::new())));
        let bits = match &mut entry.value {
            Value::Bits(bits) => bits,
            other => return Err(wrong_type(key, "bit array", other)),
        };
        for &index in indices {
            let index = index as usize;
            if index >= bits.len() {
                bits.resize(index + 1, false);
            }
            bits.set(index, true);
        }
        debug!(key, count = indices.len(), "set bits");
        Ok(())
    }

    fn get_bits(&self, key: &str, indices: &[u64]) -> Result<Vec<bool>> {
        for &index in indices {
            check_index(index)?;
        }

        let bits = self.with_live(key, |value| match value {
            Value::Bits(bits) => Ok(indices
                .iter()
                .map(|&i| bits.get(i as usize).is_some_and(|b| *b))
                .collect::<Vec<bool>>()),
            other => Err(wrong_type(key, "bit array", other)),
        })?;
        Ok(bits.unwrap_or_else(|| vec![false; indices.len()]))
    }

    fn write_record(
        &self,
        key: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut entries = self.write_entries()?;
        if record.is_empty() {
            entries.remove(key);
            return Ok(());
        }
        let expires_at = match ttl {
            Some(ttl) => {
                let at = Instant::now().checked_add(ttl).ok_or_else(|| {
                    DedupeError::InvalidInput(format!(
                        "ttl of {ttl:?} for '{key}' is out of range"
                    ))
                })?;
                Some(at)
            }
            None => None,
        };
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Record(record.clone()),
                expires_at,
            },
        );
        Ok(())
    }

    fn read_record(&self, key: &str) -> Result<SessionRecord> {
        let record = self.with_live(key, |value| match value {
            Value::Record(record) => Ok(record.clone()),
            other => Err(wrong_type(key, "record", other)),
        })?;
        Ok(record.unwrap_or_default())
    }

    fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut entries = self.write_entries()?;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::Set(HashSet::new())));
        match &mut entry.value {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            other => Err(wrong_type(key, "set", other)),
        }
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut entries = self.write_entries()?;
        let Some(entry) = entries.get_mut(key) else {
            return Ok(false);
        };
        let removed = match &mut entry.value {
            Value::Set(set) => set.remove(member),
            other => return Err(wrong_type(key, "set", other)),
        };
        // Redis drops a set once its last member is gone
        if matches!(&entry.value, Value::Set(set) if set.is_empty()) {
            entries.remove(key);
        }
        Ok(removed)
    }

    fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let found = self.with_live(key, |value| match value {
            Value::Set(set) => Ok(set.contains(member)),
            other => Err(wrong_type(key, "set", other)),
        })?;
        Ok(found.unwrap_or(false))
    }

    fn set_scalar(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.write_entries()?;
        entries.insert(
            key.to_string(),
            Entry::persistent(Value::Scalar(value.to_string())),
        );
        Ok(())
    }

    fn get_scalar(&self, key: &str) -> Result<Option<String>> {
        self.with_live(key, |value| match value {
            Value::Scalar(s) => Ok(s.clone()),
            other => Err(wrong_type(key, "scalar", other)),
        })
    }

    fn incr_scalar(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.write_entries()?;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::Scalar("0".into())));
        let current = match &mut entry.value {
            Value::Scalar(current) => current,
            other => return Err(wrong_type(key, "scalar", other)),
        };
        let parsed: i64 =
            current.parse().map_err(|_| DedupeError::CorruptValue {
                key: key.to_string(),
                value: current.clone(),
            })?;
        let next = parsed.checked_add(delta).ok_or_else(|| {
            DedupeError::StorageError(format!(
                "increment of '{key}' by {delta} overflows"
            ))
        })?;
        *current = next.to_string();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_bits_default_to_zero() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.get_bits("missing", &[0, 5, 1000]).unwrap(),
            vec![false, false, false]
        );

        store.set_bits("bits", &[3, 10]).unwrap();
        assert_eq!(
            store.get_bits("bits", &[3, 4, 10, 1_000_000]).unwrap(),
            vec![true, false, true, false]
        );
    }

    #[test]
    fn test_bits_index_limit() {
        let store = InMemoryStore::new();
        let err = store.set_bits("bits", &[MAX_BIT_ARRAY_SIZE]).unwrap_err();
        assert!(matches!(err, DedupeError::IndexOutOfBounds { .. }));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let store = InMemoryStore::new();
        store.set_scalar("key", "1").unwrap();
        assert!(matches!(
            store.set_bits("key", &[1]),
            Err(DedupeError::StorageError(_))
        ));
        assert!(store.set_add("key", "x").is_err());
        assert!(store.read_record("key").is_err());
    }

    #[test]
    fn test_record_ttl_expires() {
        let store = InMemoryStore::new();
        let record: SessionRecord =
            [("a".to_string(), "1".to_string())].into_iter().collect();
        store
            .write_record("rec", &record, Some(Duration::from_millis(50)))
            .unwrap();
        assert_eq!(store.read_record("rec").unwrap(), record);

        thread::sleep(Duration::from_millis(80));
        assert!(store.read_record("rec").unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_unrepresentable_ttl_rejected() {
        let store = InMemoryStore::new();
        let record: SessionRecord =
            [("a".to_string(), "1".to_string())].into_iter().collect();
        store.write_record("rec", &record, None).unwrap();

        let err = store
            .write_record("rec", &record, Some(Duration::MAX))
            .unwrap_err();
        assert!(matches!(err, DedupeError::InvalidInput(_)));
        // Previous record untouched
        assert_eq!(store.read_record("rec").unwrap(), record);
    }

    #[test]
    fn test_record_overwrite_drops_old_fields() {
        let store = InMemoryStore::new();
        let first: SessionRecord = [("a", "1"), ("b", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let second: SessionRecord =
            [("c".to_string(), "3".to_string())].into_iter().collect();
        store.write_record("rec", &first, None).unwrap();
        store.write_record("rec", &second, None).unwrap();
        assert_eq!(store.read_record("rec").unwrap(), second);

        store.write_record("rec", &SessionRecord::new(), None).unwrap();
        assert!(store.read_record("rec").unwrap().is_empty());
    }

    #[test]
    fn test_set_membership() {
        let store = InMemoryStore::new();
        assert!(store.set_add("s", "a").unwrap());
        assert!(!store.set_add("s", "a").unwrap());
        assert!(store.set_contains("s", "a").unwrap());
        assert!(store.set_remove("s", "a").unwrap());
        assert!(!store.set_remove("s", "a").unwrap());
        assert!(!store.set_contains("s", "a").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_scalars_and_increment() {
        let store = InMemoryStore::new();
        assert_eq!(store.get_scalar("n").unwrap(), None);
        assert_eq!(store.incr_scalar("n", 5).unwrap(), 5);
        assert_eq!(store.incr_scalar("n", -2).unwrap(), 3);
        store.set_scalar("n", "10").unwrap();
        assert_eq!(store.get_scalar("n").unwrap().as_deref(), Some("10"));

        store.set_scalar("bad", "ten").unwrap();
        assert!(matches!(
            store.incr_scalar("bad", 1),
            Err(DedupeError::CorruptValue { .. })
        ));
    }

    #[test]
    fn test_concurrent_increment_is_atomic() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.incr_scalar("n", 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get_scalar("n").unwrap().as_deref(), Some("800"));
    }
}
