//! qcinv-inventory: dynamic inventory for Tencent Cloud compute instances
//!
//! Lists instances through the provider CLI, normalizes their address fields,
//! resolves per-host connection parameters and caches the resulting index.

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod normalize;
pub mod template;
pub mod types;

pub use builder::InventoryBuilder;
pub use cache::CacheManager;
pub use client::QcloudClient;
pub use config::Config;
pub use error::InventoryError;
pub use types::{HostVars, InventoryIndex};
