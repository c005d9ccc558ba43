//! Paginated `DescribeInstances` client

use std::collections::VecDeque;
use std::sync::Arc;

use qcinv_exec::result::CommandResult;
use qcinv_exec::traits::CommandRunner;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::{FetchConfig, Pagination};
use crate::error::InventoryError;
use crate::types::Instance;

/// Number of instances requested per page
pub const BATCH_SIZE: u64 = 100;

/// One page of a `DescribeInstances` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribePage {
    total_count: u64,
    instance_set: Vec<Instance>,
}

/// Client for the provider CLI
///
/// Runs `<command> <resource> DescribeInstances` once per page through a
/// [`CommandRunner`].
pub struct QcloudClient {
    runner: Arc<dyn CommandRunner>,
    settings: FetchConfig,
}

impl QcloudClient {
    /// Create a new client
    pub fn new(runner: Arc<dyn CommandRunner>, settings: FetchConfig) -> Self {
        Self { runner, settings }
    }

    /// Pagination mode in effect
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        self.settings.pagination
    }

    /// Lazily list every instance of `resource`
    ///
    /// Nothing is fetched until the first call to [`Instances::next`].
    #[must_use]
    pub fn describe(&self, resource: &str) -> Instances<'_> {
        Instances {
            client: self,
            resource: resource.to_string(),
            buffered: VecDeque::new(),
            requested: 0,
            total: None,
            page: 0,
            done: false,
        }
    }

    fn page_args(&self, resource: &str, offset: u64) -> Vec<String> {
        let mut args = vec![resource.to_string(), "DescribeInstances".to_string()];

        if let Some(region) = &self.settings.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(profile) = &self.settings.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }

        // Legacy mode sends no cursor, so the provider returns the first page
        // on every call.
        if self.settings.pagination == Pagination::Offset {
            args.push("--Offset".to_string());
            args.push(offset.to_string());
            args.push("--Limit".to_string());
            args.push(BATCH_SIZE.to_string());
        }

        args
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_page(&self, resource: &str, offset: u64) -> Result<DescribePage, InventoryError> {
        let args = self.page_args(resource, offset);

        debug!(runner = self.runner.runner_type(), command = %self.settings.command, "requesting page");

        let result = self
            .runner
            .run(&self.settings.command, &args)
            .await
            .and_then(CommandResult::into_success)
            .map_err(|e| {
                let reason = if e.is_spawn_failure() {
                    format!("{e} (is `{}` installed and on PATH?)", self.settings.command)
                } else {
                    e.to_string()
                };
                InventoryError::fetch(resource, reason)
            })?;

        let page: DescribePage = serde_json::from_str(&result.stdout)
            .map_err(|e| InventoryError::fetch(resource, format!("malformed response: {e}")))?;

        debug!(
            items = page.instance_set.len(),
            total = page.total_count,
            duration = ?result.duration,
            "page received"
        );

        Ok(page)
    }
}

/// Lazy, finite sequence of instances produced by [`QcloudClient::describe`]
///
/// Pages are requested one at a time until the number of items requested
/// reaches the `TotalCount` reported by the first page.
pub struct Instances<'a> {
    client: &'a QcloudClient,
    resource: String,
    buffered: VecDeque<Instance>,
    requested: u64,
    total: Option<u64>,
    page: u32,
    done: bool,
}

impl Instances<'_> {
    /// Next instance, fetching another page when the current one is drained
    ///
    /// After an error the sequence is finished.
    pub async fn next(&mut self) -> Option<Result<Instance, InventoryError>> {
        loop {
            if let Some(instance) = self.buffered.pop_front() {
                return Some(Ok(instance));
            }
            if self.done || self.total.is_some_and(|total| self.requested >= total) {
                self.done = true;
                return None;
            }

            self.page += 1;
            let page = match self
                .client
                .fetch_page(&self.resource, self.requested)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            self.requested += BATCH_SIZE;
            let total = *self.total.get_or_insert(page.total_count);
            if page.total_count != total {
                warn!(
                    first = total,
                    current = page.total_count,
                    "TotalCount changed between pages, keeping the first value"
                );
            }

            debug!(
                page = self.page,
                requested = self.requested,
                total = total,
                "fetched page"
            );
            self.buffered.extend(page.instance_set);
        }
    }

    /// Number of pages requested so far
    #[must_use]
    pub fn pages_fetched(&self) -> u32 {
        self.page
    }
}
