use thiserror::Error;

pub type Result<T> = std::result::Result<T, DedupeError>;

#[derive(Error, Debug)]
pub enum DedupeError {
    #[error("Storage operation failed: {0}")]
    StorageError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown category: '{0}'")]
    UnknownCategory(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index out of bounds: {index} >= {capacity}")]
    IndexOutOfBounds { index: u64, capacity: u64 },

    #[error("Value stored under '{key}' is not an integer: '{value}'")]
    CorruptValue { key: String, value: String },

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Failed to parse {var_name}='{value}': {error}")]
    EnvParseError {
        var_name: String,
        value: String,
        error: String,
    },

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

impl DedupeError {
    /// True for failures talking to the shared store, as opposed to bad
    /// input or configuration rejected before any store call.
    pub fn is_transient(&self) -> bool {
        match self {
            DedupeError::StorageError(_) | DedupeError::LockError(_) => true,
            #[cfg(feature = "redis")]
            DedupeError::RedisError(_) => true,
            _ => false,
        }
    }
}
