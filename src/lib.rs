pub mod api;
pub mod cache;
pub mod env_config;
pub mod http_cache;
pub mod logging;
pub mod state;
