use std::sync::Arc;

use crate::cache::TieredCache;

/// Shared application state for handlers: the single tiered cache instance
/// threaded into every route.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<TieredCache>,
}

impl AppState {
    pub fn new(cache: Arc<TieredCache>) -> Self {
        Self { cache }
    }
}
