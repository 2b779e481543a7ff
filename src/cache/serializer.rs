use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::CacheError;

/// Encodes/decodes arbitrary values to/from opaque bytes.
///
/// Swapping the serializer does not affect the L1/L2 contract: the cache
/// only ever stores and transports the bytes this trait produces. Generic
/// methods keep this dispatched statically (via `TieredCache<S>`) rather
/// than through a trait object, since `encode`/`decode` are generic over
/// the value type.
pub trait Serializer: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError>;
}

/// The default JSON-compatible codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}
