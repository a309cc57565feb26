use crate::category::{Category, CategoryRegistry};
use crate::error::{DedupeError, Result};
use crate::hash::{Fingerprint, compose};
use std::sync::Arc;
use tracing::debug;

/// Format of the calendar-day bucket folded into daily-reset fingerprints.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Source of the current calendar day.
pub trait Clock: Send + Sync {
    fn today(&self) -> String;
}

/// Local wall-clock date.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> String {
        chrono::Local::now().format(DAY_FORMAT).to_string()
    }
}

/// Always reports the same day.
#[derive(Debug, Clone)]
pub struct FixedClock(String);

impl FixedClock {
    pub fn new(day: impl Into<String>) -> Self {
        Self(day.into())
    }
}

impl Clock for FixedClock {
    fn today(&self) -> String {
        self.0.clone()
    }
}

/// Number of caller-supplied fields each category expects after the
/// source id.
fn expected_fields(category: Category) -> usize {
    match category {
        Category::Goods | Category::User => 1,
        Category::Post | Category::Image | Category::Attachment => 2,
    }
}

/// Category-aware `exists`/`add` on top of [`CategoryRegistry`].
///
/// Field tuples per category:
///
/// | category   | tuple                                          |
/// |------------|------------------------------------------------|
/// | goods      | `(source, url, today)`                         |
/// | post       | `(source, url, timestamp)`                     |
/// | user       | `(source, user_id, today)`                     |
/// | image      | `(source, image_url, image_name)`              |
/// | attachment | `(source, attachment_name, attachment_url)`    |
///
/// `exists` followed by `add` is not atomic: two workers may both see a
/// miss and process the same item.
#[derive(Clone)]
pub struct DedupeFacade {
    registry: Arc<CategoryRegistry>,
    clock: Arc<dyn Clock>,
}

impl DedupeFacade {
    pub fn new(registry: Arc<CategoryRegistry>) -> Self {
        Self::with_clock(registry, Arc::new(SystemClock))
    }

    pub fn with_clock(
        registry: Arc<CategoryRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { registry, clock }
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Builds the fingerprint for `category` from the caller's fields,
    /// appending the day bucket where the category resets daily.
    pub fn fingerprint(
        &self,
        category: Category,
        source: &str,
        fields: &[&str],
    ) -> Result<Fingerprint> {
        if source.is_empty() {
            return Err(DedupeError::InvalidInput(
                "source id must not be empty".into(),
            ));
        }
        let expected = expected_fields(category);
        if fields.len() != expected {
            return Err(DedupeError::InvalidInput(format!(
                "{category} expects {expected} field(s), got {}",
                fields.len()
            )));
        }

        let today;
        let mut tuple = Vec::with_capacity(expected + 2);
        tuple.push(source);
        tuple.extend_from_slice(fields);
        if matches!(category, Category::Goods | Category::User) {
            today = self.clock.today();
            tuple.push(&today);
        }
        compose(&tuple)
    }

    pub fn exists(
        &self,
        category: Category,
        source: &str,
        fields: &[&str],
    ) -> Result<bool> {
        let fingerprint = self.fingerprint(category, source, fields)?;
        let seen = self.registry.filter(category).exists(&fingerprint)?;
        debug!(%category, source, %fingerprint, seen, "dedupe check");
        Ok(seen)
    }

    pub fn add(
        &self,
        category: Category,
        source: &str,
        fields: &[&str],
    ) -> Result<()> {
        let fingerprint = self.fingerprint(category, source, fields)?;
        self.registry.filter(category).insert(&fingerprint)
    }

    pub fn goods_exists(&self, source: &str, url: &str) -> Result<bool> {
        self.exists(Category::Goods, source, &[url])
    }

    pub fn goods_add(&self, source: &str, url: &str) -> Result<()> {
        self.add(Category::Goods, source, &[url])
    }

    pub fn post_exists(
        &self,
        source: &str,
        url: &str,
        timestamp: &str,
    ) -> Result<bool> {
        self.exists(Category::Post, source, &[url, timestamp])
    }

    pub fn post_add(
        &self,
        source: &str,
        url: &str,
        timestamp: &str,
    ) -> Result<()> {
        self.add(Category::Post, source, &[url, timestamp])
    }

    pub fn user_exists(&self, source: &str, user_id: &str) -> Result<bool> {
        self.exists(Category::User, source, &[user_id])
    }

    pub fn user_add(&self, source: &str, user_id: &str) -> Result<()> {
        self.add(Category::User, source, &[user_id])
    }

    pub fn image_exists(
        &self,
        source: &str,
        image_url: &str,
        image_name: &str,
    ) -> Result<bool> {
        self.exists(Category::Image, source, &[image_url, image_name])
    }

    pub fn image_add(
        &self,
        source: &str,
        image_url: &str,
        image_name: &str,
    ) -> Result<()> {
        self.add(Category::Image, source, &[image_url, image_name])
    }

    pub fn attachment_exists(
        &self,
        source: &str,
        attachment_name: &str,
        attachment_url: &str,
    ) -> Result<bool> {
        self.exists(
            Category::Attachment,
            source,
            &[attachment_name, attachment_url],
        )
    }

    pub fn attachment_add(
        &self,
        source: &str,
        attachment_name: &str,
        attachment_url: &str,
    ) -> Result<()> {
        self.add(
            Category::Attachment,
            source,
            &[attachment_name, attachment_url],
        )
    }
}
