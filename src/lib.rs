//! Shared-store deduplication for fleets of crawl workers.
//!
//! Every worker process talks to the same external store (Redis in
//! production). Nothing is kept in process memory that another worker would
//! need, so any number of workers can check and mark content concurrently.
//!
//! HowTo:
//!    * Fingerprints: the identifying fields of an item (source, URL, day, ...)
//!      are concatenated and hashed with SHA-256.
//!    * Bloom filters: each content category owns a bit array of `m` bits in
//!      the store. A fingerprint maps to `k` positions by double hashing.
//!    * Registry: one lazily opened filter per category, shared by all
//!      threads of a process.
//!
//! Insertion:
//!     * Set the `k` bits. Each SETBIT is atomic on its own; bits are never
//!       cleared, so a completed insert can never be lost.
//! Query:
//!     * The item is considered seen if all `k` bits are set.
//!
//! Obvious problems:
//!     * False positives: with `n` items the rate is about
//!       `(1 - e^(-kn/m))^k`. Size `m` for the expected load.
//!     * Check-then-add is racy: two workers may both see a miss and both
//!       process the item. Dedupe avoids most duplicate work, not all.
//!     * No deletion. Use [`ExactFingerprintSet`] for anything that must be
//!       forgotten.
//!
//! Besides the filters the crate keeps per-source cookie records
//! ([`SessionStore`]) and per-site page counters ([`ProgressCounters`]).

pub mod category;
pub mod common;
mod config;
mod counters;
mod dedupe;
mod error;
mod filter;
mod fingerprint_set;
mod hash;
#[cfg(feature = "redis")]
mod redis_store;
mod session;
mod store;

pub use category::{Category, CategoryRegistry, RegistryConfig};
pub use config::{
    DedupeSettings, DedupeSettingsBuilder, DedupeSettingsBuilderError,
};
pub use counters::ProgressCounters;
pub use dedupe::{Clock, DAY_FORMAT, DedupeFacade, FixedClock, SystemClock};
pub use error::{DedupeError, Result};
pub use filter::{
    BitFilter, BitFilterConfig, BitFilterConfigBuilder,
    BitFilterConfigBuilderError,
};
pub use fingerprint_set::ExactFingerprintSet;
pub use hash::{
    DIGEST_LEN, Fingerprint, PositionFunction, compose,
    default_position_function, double_hash_positions,
    estimated_false_positive_rate, optimal_bit_vector_size, optimal_num_hashes,
};
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use session::SessionStore;
pub use store::{
    InMemoryStore, MAX_BIT_ARRAY_SIZE, SessionRecord, SharedStore, StoreHandle,
};
