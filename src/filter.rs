use crate::error::{DedupeError, Result};
use crate::hash::{
    Fingerprint, PositionFunction, default_position_function,
    estimated_false_positive_rate, optimal_bit_vector_size, optimal_num_hashes,
};
use crate::store::{MAX_BIT_ARRAY_SIZE, StoreHandle};
use derive_builder::Builder;
use tracing::{debug, info};

/// Parameters of one Bloom filter. Fixed for the lifetime of the filter.
#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct BitFilterConfig {
    /// Key of the bit array in the shared store
    #[builder(setter(into))]
    pub name: String,

    /// Size `m` of the bit array, in bits
    #[builder(default = "1 << 30")]
    pub bit_size: u64,

    /// Number `k` of bit positions per fingerprint
    #[builder(default = "6")]
    pub num_hashes: usize,

    /// Derives the `k` positions from a fingerprint digest
    #[builder(default = "default_position_function")]
    pub position_function: PositionFunction,
}

impl BitFilterConfig {
    /// Sizes the filter for `capacity` items at `false_positive_rate`.
    pub fn for_capacity(
        name: impl Into<String>,
        capacity: usize,
        false_positive_rate: f64,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(DedupeError::InvalidConfig(
                "Capacity must be > 0".into(),
            ));
        }
        if false_positive_rate <= 0.0 || false_positive_rate >= 1.0 {
            return Err(DedupeError::InvalidConfig(
                "FPR must be between 0 and 1".into(),
            ));
        }
        let bit_size = optimal_bit_vector_size(capacity, false_positive_rate);
        let config = Self {
            name: name.into(),
            bit_size,
            num_hashes: optimal_num_hashes(capacity, bit_size),
            position_function: default_position_function,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DedupeError::InvalidConfig(
                "Filter name must not be empty".into(),
            ));
        }
        if self.bit_size == 0 || self.bit_size > MAX_BIT_ARRAY_SIZE {
            return Err(DedupeError::InvalidConfig(format!(
                "Bit size must be in 1..={MAX_BIT_ARRAY_SIZE}, got {}",
                self.bit_size
            )));
        }
        if self.num_hashes == 0 {
            return Err(DedupeError::InvalidConfig(
                "Number of hashes must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Bloom filter whose bit array lives in the shared store.
///
/// Any process opening a filter with the same name and parameters against
/// the same store sees the same set. Bits are only ever set, so once
/// `insert` returns, `exists` for that fingerprint is true everywhere.
pub struct BitFilter {
    store: StoreHandle,
    config: BitFilterConfig,
}

impl BitFilter {
    pub fn new(store: StoreHandle, config: BitFilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(store, config))
    }

    pub(crate) fn from_validated(
        store: StoreHandle,
        config: BitFilterConfig,
    ) -> Self {
        info!(
            name = %config.name,
            bit_size = config.bit_size,
            num_hashes = config.num_hashes,
            "opened bit filter"
        );
        Self { store, config }
    }

    pub fn positions(&self, fingerprint: &Fingerprint) -> Vec<u64> {
        (self.config.position_function)(
            fingerprint.digest(),
            self.config.num_hashes,
            self.config.bit_size,
        )
    }

    pub fn insert(&self, fingerprint: &Fingerprint) -> Result<()> {
        let positions = self.checked_positions(fingerprint)?;
        self.store.set_bits(&self.config.name, &positions)?;
        debug!(filter = %self.config.name, %fingerprint, "inserted");
        Ok(())
    }

    pub fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let positions = self.checked_positions(fingerprint)?;
        let bits = self.store.get_bits(&self.config.name, &positions)?;
        Ok(bits.iter().all(|&bit| bit))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn bit_size(&self) -> u64 {
        self.config.bit_size
    }

    pub fn num_hashes(&self) -> usize {
        self.config.num_hashes
    }

    pub fn config(&self) -> &BitFilterConfig {
        &self.config
    }

    /// Expected false positive rate after `inserted` distinct items.
    pub fn estimated_false_positive_rate(&self, inserted: usize) -> f64 {
        estimated_false_positive_rate(
            inserted,
            self.config.bit_size,
            self.config.num_hashes,
        )
    }

    fn checked_positions(&self, fingerprint: &Fingerprint) -> Result<Vec<u64>> {
        let positions = self.positions(fingerprint);
        // Custom position functions are not trusted to stay in range
        if let Some(&index) =
            positions.iter().find(|&&p| p >= self.config.bit_size)
        {
            return Err(DedupeError::IndexOutOfBounds {
                index,
                capacity: self.config.bit_size,
            });
        }
        Ok(positions)
    }
}

impl std::fmt::Debug for BitFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BitFilter {{ name: {}, bit_size: {}, num_hashes: {} }}",
            self.config.name, self.config.bit_size, self.config.num_hashes
        )
    }
}
