use thiserror::Error;

/// Error taxonomy for the cache core.
///
/// `NotFound` is a sentinel, not a failure: callers are expected to match on
/// it rather than log it as an error.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("key not found")]
    NotFound,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("remote cache error: {0}")]
    Remote(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to parse element: {0}")]
    Parse(String),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }
}
