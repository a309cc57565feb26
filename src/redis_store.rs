use crate::error::{DedupeError, Result};
use crate::store::{
    MAX_BIT_ARRAY_SIZE, SessionRecord, SharedStore, StoreHandle,
};
use redis::{Client, Commands, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// [`SharedStore`] backed by a Redis server.
///
/// Bit arrays are Redis strings driven with SETBIT/GETBIT, records are
/// hashes, exact sets are Redis sets and scalars are plain strings.
pub struct RedisStore {
    conn: Mutex<Connection>,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            DedupeError::StorageError(format!("Redis connection error: {e}"))
        })?;

        let conn = client.get_connection().map_err(|e| {
            DedupeError::StorageError(format!("Redis connection error: {e}"))
        })?;

        info!(redis_url, "connected to shared store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn into_handle(self) -> StoreHandle {
        Arc::new(self)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            DedupeError::LockError(format!("Redis lock error: {e}"))
        })
    }
}

fn check_indices(indices: &[u64]) -> Result<()> {
    if let Some(&max_index) = indices.iter().max() {
        if max_index >= MAX_BIT_ARRAY_SIZE {
            return Err(DedupeError::IndexOutOfBounds {
                index: max_index,
                capacity: MAX_BIT_ARRAY_SIZE,
            });
        }
    }
    Ok(())
}

/// PEXPIRE argument for `ttl`; Redis reads a negative value as "delete now".
fn ttl_millis(key: &str, ttl: Duration) -> Result<i64> {
    i64::try_from(ttl.as_millis()).map_err(|_| {
        DedupeError::InvalidInput(format!(
            "ttl of {ttl:?} for '{key}' is out of range"
        ))
    })
}

impl SharedStore for RedisStore {
    fn set_bits(&self, key: &str, indices: &[u64]) -> Result<()> {
        check_indices(indices)?;

        // Pipelined but not MULTI: every SETBIT stands alone
        let mut pipe = redis::pipe();
        for &index in indices {
            pipe.cmd("SETBIT").arg(key).arg(index).arg(1).ignore();
        }

        let mut conn = self.conn()?;
        let _: () = pipe.query(&mut *conn)?;
        debug!(key, count = indices.len(), "SETBIT");
        Ok(())
    }

    fn get_bits(&self, key: &str, indices: &[u64]) -> Result<Vec<bool>> {
        check_indices(indices)?;

        let mut pipe = redis::pipe();
        for &index in indices {
            pipe.cmd("GETBIT").arg(key).arg(index);
        }

        let mut conn = self.conn()?;
        let values: Vec<i64> = pipe.query(&mut *conn)?;
        Ok(values.into_iter().map(|v| v == 1).collect())
    }

    fn write_record(
        &self,
        key: &str,
        record: &SessionRecord,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let items: Vec<(&str, &str)> = record
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !items.is_empty() {
            pipe.hset_multiple(key, items.as_slice()).ignore();
            if let Some(ttl) = ttl {
                pipe.pexpire(key, ttl_millis(key, ttl)?).ignore();
            }
        }

        let mut conn = self.conn()?;
        let _: () = pipe.query(&mut *conn)?;
        debug!(key, fields = items.len(), ?ttl, "wrote record");
        Ok(())
    }

    fn read_record(&self, key: &str) -> Result<SessionRecord> {
        let mut conn = self.conn()?;
        Ok(conn.hgetall(key)?)
    }

    fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let added: i64 = conn.sadd(key, member)?;
        Ok(added == 1)
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let removed: i64 = conn.srem(key, member)?;
        Ok(removed == 1)
    }

    fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        Ok(conn.sismember(key, member)?)
    }

    fn set_scalar(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let _: () = conn.set(key, value)?;
        Ok(())
    }

    fn get_scalar(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn()?;
        Ok(conn.get(key)?)
    }

    fn incr_scalar(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn()?;
        Ok(conn.incr(key, delta)?)
    }
}
