//! Inventory assembly

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::cache::CacheManager;
use crate::client::QcloudClient;
use crate::config::Config;
use crate::connection::ConnectionResolver;
use crate::error::InventoryError;
use crate::normalize::extract_ips;
use crate::types::{HostVars, Instance, InventoryIndex};

/// Resource kind for compute instances
pub const CVM: &str = "cvm";

/// Replace every character outside `[A-Za-z0-9-]` with `_`
#[must_use]
pub fn to_safe(word: &str) -> String {
    word.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Builds the inventory index from the provider
pub struct InventoryBuilder {
    client: QcloudClient,
    config: Arc<Config>,
}

impl InventoryBuilder {
    /// Create a new builder
    pub fn new(client: QcloudClient, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    /// Fetch every instance and assemble the index
    ///
    /// # Errors
    /// Returns the first fetch, configuration or template error; no partial
    /// index is produced.
    #[instrument(skip(self))]
    pub async fn build(&self) -> Result<InventoryIndex, InventoryError> {
        info!(pagination = %self.client.pagination(), "building inventory");

        let mut index = InventoryIndex::new();
        self.add_cvm(&mut index).await?;

        info!(hosts = index.host_count(), "inventory built");
        Ok(index)
    }

    async fn add_cvm(&self, index: &mut InventoryIndex) -> Result<(), InventoryError> {
        let kind = self.config.kind(CVM)?;
        let resolver = ConnectionResolver::compile(CVM, kind)?;
        let hostname_field = &kind.hostname_field;

        let mut instances = self.client.describe(CVM);
        while let Some(instance) = instances.next().await {
            let instance = instance?;
            let safe_name = to_safe(&display_name(&instance, hostname_field)?);

            let instance = extract_ips(instance);
            let connection = resolver.resolve(&safe_name, &instance)?;

            debug!(host = %safe_name, "adding host");
            index.add_host(
                CVM,
                safe_name,
                HostVars {
                    connection,
                    qcloud: instance,
                },
            );
        }

        info!(
            pages = instances.pages_fetched(),
            hosts = index.hosts(CVM).len(),
            "listed cvm instances"
        );
        Ok(())
    }

    /// Serve the inventory from cache, or rebuild and store it
    ///
    /// Rebuilds when `refresh` is set, the cache is stale or missing, or
    /// caching is disabled.
    ///
    /// # Errors
    /// Returns build errors and cache I/O or parse errors.
    pub async fn load_or_build(
        &self,
        cache: &CacheManager,
        refresh: bool,
    ) -> Result<InventoryIndex, InventoryError> {
        if refresh || !cache.is_valid() || cache.is_disabled() {
            debug!(refresh, disabled = cache.is_disabled(), "rebuilding inventory");
            let index = self.build().await?;
            cache.store(&index)?;
            Ok(index)
        } else {
            cache.load()
        }
    }
}

fn display_name(instance: &Instance, field: &str) -> Result<String, InventoryError> {
    match instance.get(field) {
        Some(Value::String(name)) => Ok(name.clone()),
        Some(Value::Null) | None => Err(InventoryError::missing(field, instance_label(instance))),
        Some(other) => Ok(other.to_string()),
    }
}

fn instance_label(instance: &Instance) -> String {
    match instance.get("InstanceId").and_then(Value::as_str) {
        Some(id) => format!("instance {id}"),
        None => "instance record".to_string(),
    }
}
