//! The remote (L2) tier interface and a Redis-backed driver wrapper.
//!
//! `RemoteStore` is the external collaborator contract: the tiered cache
//! never assumes anything about the backing store beyond this trait.
//! `RedisStore` is thin glue around it — it satisfies the trait and
//! nothing more.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::error::CacheError;

/// The L2 interface external collaborator contract.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    /// Returns keys whose remote representation starts with the literal
    /// prefix `pattern`, plus `(keys, next_cursor)`; `next_cursor == 0`
    /// signals the scan is complete. `pattern` is a plain prefix, not a
    /// glob: implementations backed by a glob-matching `SCAN` (e.g. Redis)
    /// must escape glob metacharacters in it before matching.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        batch: usize,
    ) -> Result<(Vec<String>, u64), CacheError>;
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Escapes Redis glob metacharacters (`*`, `?`, `[`, `]`, `\`) in `pattern`
/// so `SCAN ... MATCH` treats it as a literal prefix.
fn escape_glob(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A Redis-backed `RemoteStore`, the default L2 driver wrapper.
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Configuration(e.to_string()))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| CacheError::Configuration(format!("connected to redis has error: {e}")))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| CacheError::Remote(e.to_string()))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| CacheError::Remote(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::Remote(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| CacheError::Remote(e.to_string()))?;
        Ok(exists)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        batch: usize,
    ) -> Result<(Vec<String>, u64), CacheError> {
        let mut conn = self.connection.clone();
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{}*", escape_glob(pattern)))
            .arg("COUNT")
            .arg(batch)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Remote(e.to_string()))?;
        Ok((keys, next_cursor))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| CacheError::Remote(e.to_string()))?;
        Ok(())
    }
}
