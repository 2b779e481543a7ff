use serde::de::DeserializeOwned;

use super::error::CacheError;
use super::serializer::Serializer;

/// A typed wrapper around the raw bytes returned by a `Get`, with
/// parse-on-access accessors.
///
/// Numeric/bool accessors parse the UTF-8 textual representation of the
/// bytes; they do not inspect the serializer's wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    bytes: Vec<u8>,
}

impl Element {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_string(&self) -> Result<String, CacheError> {
        String::from_utf8(self.bytes.clone())
            .map_err(|e| CacheError::Parse(e.to_string()))
    }

    pub fn as_int(&self) -> Result<i32, CacheError> {
        self.as_text()?
            .parse::<i32>()
            .map_err(|e| CacheError::Parse(e.to_string()))
    }

    pub fn as_int64(&self) -> Result<i64, CacheError> {
        self.as_text()?
            .parse::<i64>()
            .map_err(|e| CacheError::Parse(e.to_string()))
    }

    pub fn as_float64(&self) -> Result<f64, CacheError> {
        self.as_text()?
            .parse::<f64>()
            .map_err(|e| CacheError::Parse(e.to_string()))
    }

    pub fn as_bool(&self) -> Result<bool, CacheError> {
        self.as_text()?
            .parse::<bool>()
            .map_err(|e| CacheError::Parse(e.to_string()))
    }

    /// Decodes the raw bytes into `T` using the given serializer.
    pub fn into_value<T: DeserializeOwned, S: Serializer>(
        &self,
        serializer: &S,
    ) -> Result<T, CacheError> {
        serializer.decode(&self.bytes)
    }

    fn as_text(&self) -> Result<String, CacheError> {
        std::str::from_utf8(&self.bytes)
            .map(str::trim)
            .map(str::to_string)
            .map_err(|e| CacheError::Parse(e.to_string()))
    }
}
