//! Rendering of `--list` and `--host` output

use qcinv_inventory::InventoryIndex;
use qcinv_inventory::types::to_sorted_json;
use serde_json::{Map, Value};

/// Render the whole index, or the variables of one host
///
/// An unknown host renders as an empty object.
pub fn render(index: &InventoryIndex, host: Option<&str>) -> Result<String, serde_json::Error> {
    match host {
        None => to_sorted_json(index),
        Some(name) => match index.host_vars(name) {
            Some(vars) => to_sorted_json(vars),
            None => {
                tracing::debug!(host = name, "unknown host");
                to_sorted_json(&Value::Object(Map::new()))
            }
        },
    }
}
