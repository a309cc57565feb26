use shared_dedupe_rs::{
    CategoryRegistry, DedupeFacade, FixedClock, InMemoryStore, RegistryConfig,
    StoreHandle,
};
use std::sync::Arc;

/// Registry over a fresh in-memory store with small filters.
#[allow(dead_code)]
pub fn small_registry(store: StoreHandle) -> Arc<CategoryRegistry> {
    Arc::new(
        CategoryRegistry::new(store, RegistryConfig::uniform(1 << 16, 4))
            .expect("Failed to create registry"),
    )
}

/// Facade whose day bucket is pinned to `day`.
#[allow(dead_code)]
pub fn facade_on(store: StoreHandle, day: &str) -> DedupeFacade {
    DedupeFacade::with_clock(
        small_registry(store),
        Arc::new(FixedClock::new(day)),
    )
}

#[allow(dead_code)]
pub fn fresh_store() -> StoreHandle {
    InMemoryStore::new().into_handle()
}
