//! Error types for qcinv-inventory

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building, caching or serving the inventory
#[derive(Error, Debug)]
pub enum InventoryError {
    /// The provider CLI failed or returned malformed data
    #[error("fetch failed for {resource}: {reason}")]
    Fetch {
        /// Resource category being listed
        resource: String,
        /// What went wrong
        reason: String,
    },

    /// A required config key or templated record field is absent
    #[error("missing field `{field}` in {context}")]
    MissingField {
        /// Name of the absent key or field
        field: String,
        /// Where it was looked up
        context: String,
    },

    /// A connection template is malformed
    #[error("invalid template `{template}`: {reason}")]
    Template {
        /// Template source text
        template: String,
        /// Why parsing failed
        reason: String,
    },

    /// Cache directory or file access failed
    #[error("cache I/O error at {}: {source}", path.display())]
    CacheIo {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Cache artifact could not be parsed or serialized
    #[error("cache parse error at {}: {source}", path.display())]
    CacheParse {
        /// Path of the artifact
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl InventoryError {
    pub(crate) fn fetch(resource: &str, reason: impl Into<String>) -> Self {
        InventoryError::Fetch {
            resource: resource.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(field: impl Into<String>, context: impl Into<String>) -> Self {
        InventoryError::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Check if the error came from the cache layer
    #[must_use]
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            InventoryError::CacheIo { .. } | InventoryError::CacheParse { .. }
        )
    }
}
