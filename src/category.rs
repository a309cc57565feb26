use crate::error::{DedupeError, Result};
use crate::filter::{BitFilter, BitFilterConfig};
use crate::hash::{PositionFunction, default_position_function};
use crate::store::StoreHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// Content categories that get their own Bloom filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Goods,
    Post,
    User,
    #[serde(rename = "img")]
    Image,
    #[serde(rename = "attach")]
    Attachment,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Goods,
        Category::Post,
        Category::User,
        Category::Image,
        Category::Attachment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Goods => "goods",
            Category::Post => "post",
            Category::User => "user",
            Category::Image => "img",
            Category::Attachment => "attach",
        }
    }

    /// Bit array key used by every worker for this category.
    pub fn filter_name(self) -> &'static str {
        match self {
            Category::Goods => "bloom_filter_goods",
            Category::Post => "bloom_filter_post",
            Category::User => "bloom_filter_user",
            Category::Image => "bloom_filter_img",
            Category::Attachment => "bloom_filter_attach",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DedupeError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "" => Err(DedupeError::InvalidInput(
                "category tag must not be empty".into(),
            )),
            "goods" => Ok(Category::Goods),
            "post" => Ok(Category::Post),
            "user" => Ok(Category::User),
            "img" | "image" => Ok(Category::Image),
            "attach" | "attachment" => Ok(Category::Attachment),
            other => Err(DedupeError::UnknownCategory(other.to_string())),
        }
    }
}

/// Filter parameters for every category.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    filters: [BitFilterConfig; 5],
}

impl RegistryConfig {
    /// Same `m` and `k` for every category, each under its own key.
    pub fn uniform(bit_size: u64, num_hashes: usize) -> Self {
        Self::uniform_with(bit_size, num_hashes, default_position_function)
    }

    pub fn uniform_with(
        bit_size: u64,
        num_hashes: usize,
        position_function: PositionFunction,
    ) -> Self {
        Self {
            filters: Category::ALL.map(|category| BitFilterConfig {
                name: category.filter_name().to_string(),
                bit_size,
                num_hashes,
                position_function,
            }),
        }
    }

    /// Overrides the filter for one category.
    pub fn with_filter(
        mut self,
        category: Category,
        config: BitFilterConfig,
    ) -> Self {
        self.filters[category.slot()] = config;
        self
    }

    pub fn filter_config(&self, category: Category) -> &BitFilterConfig {
        &self.filters[category.slot()]
    }

    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            self.filter_config(category).validate().map_err(|e| {
                DedupeError::InvalidConfig(format!("{category}: {e}"))
            })?;
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::uniform(1 << 30, 6)
    }
}

/// One lazily-opened [`BitFilter`] per [`Category`], shared by every
/// caller in the process.
pub struct CategoryRegistry {
    store: StoreHandle,
    config: RegistryConfig,
    filters: [OnceLock<BitFilter>; 5],
}

impl CategoryRegistry {
    /// Validates every category's parameters up front so that later
    /// lookups cannot fail.
    pub fn new(store: StoreHandle, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            filters: Default::default(),
        })
    }

    pub fn filter(&self, category: Category) -> &BitFilter {
        self.filters[category.slot()].get_or_init(|| {
            debug!(%category, "creating filter on first use");
            BitFilter::from_validated(
                self.store.clone(),
                self.config.filter_config(category).clone(),
            )
        })
    }

    /// Resolves a textual category tag, rejecting unknown ones.
    pub fn filter_for_tag(&self, tag: &str) -> Result<&BitFilter> {
        let category: Category = tag.parse()?;
        Ok(self.filter(category))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }
}
