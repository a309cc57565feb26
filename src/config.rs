use crate::category::RegistryConfig;
use crate::error::{DedupeError, Result};
use derive_builder::Builder;
use std::str::FromStr;

/// Runtime settings shared by every worker, read from the environment
/// (and a `.env` file when present).
#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned")]
pub struct DedupeSettings {
    #[builder(default = "\"redis://127.0.0.1:6379/0\".to_string()")]
    pub redis_url: String,
    /// Bit arrays hold `2^bloom_bit` bits
    #[builder(default = "30")]
    pub bloom_bit: u32,
    #[builder(default = "6")]
    pub bloom_hash_number: usize,
}

fn env_or<T>(var_name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = std::env::var(var_name).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e: T::Err| DedupeError::EnvParseError {
        var_name: var_name.to_string(),
        value: value.clone(),
        error: e.to_string(),
    })
}

impl DedupeSettings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Self {
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379/0")?,
            bloom_bit: env_or("BLOOMFILTER_BIT", "30")?,
            bloom_hash_number: env_or("BLOOMFILTER_HASH_NUMBER", "6")?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bloom_bit == 0 || self.bloom_bit > 32 {
            return Err(DedupeError::InvalidConfig(format!(
                "BLOOMFILTER_BIT must be in 1..=32, got {}",
                self.bloom_bit
            )));
        }
        if self.bloom_hash_number == 0 {
            return Err(DedupeError::InvalidConfig(
                "BLOOMFILTER_HASH_NUMBER must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// `2^bloom_bit`; fails for settings that do not pass [`validate`].
    ///
    /// [`validate`]: Self::validate
    pub fn bit_size(&self) -> Result<u64> {
        self.validate()?;
        Ok(1u64 << self.bloom_bit)
    }

    pub fn registry_config(&self) -> Result<RegistryConfig> {
        Ok(RegistryConfig::uniform(
            self.bit_size()?,
            self.bloom_hash_number,
        ))
    }
}
