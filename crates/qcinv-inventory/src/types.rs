//! Inventory type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One raw instance record as returned by the provider
pub type Instance = Map<String, Value>;

// ============================================================================
// Host variables
// ============================================================================

/// Resolved connection parameters for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Login user
    pub user: String,
    /// Address to connect to
    pub host: String,
    /// SSH port
    pub port: String,
}

/// Everything known about one host: connection parameters plus the
/// normalized provider record under `qcloud`
#[derive(Debug, Clone, PartialEq)]
pub struct HostVars {
    /// Connection parameters
    pub connection: ConnectionParams,
    /// Normalized instance record
    pub qcloud: Instance,
}

impl From<HostVars> for Value {
    fn from(vars: HostVars) -> Self {
        let mut map = Map::new();
        map.insert(SSH_USER.to_string(), Value::String(vars.connection.user));
        map.insert(SSH_HOST.to_string(), Value::String(vars.connection.host));
        map.insert(SSH_PORT.to_string(), Value::String(vars.connection.port));
        map.insert(QCLOUD.to_string(), Value::Object(vars.qcloud));
        Value::Object(map)
    }
}

/// Host variable holding the login user
pub const SSH_USER: &str = "ansible_ssh_user";
/// Host variable holding the address to connect to
pub const SSH_HOST: &str = "ansible_ssh_host";
/// Host variable holding the SSH port
pub const SSH_PORT: &str = "ansible_ssh_port";
/// Host variable holding the normalized provider record
pub const QCLOUD: &str = "qcloud";

// ============================================================================
// Inventory index
// ============================================================================

const META: &str = "_meta";
const HOSTVARS: &str = "hostvars";

/// Group/host index in the shape expected by Ansible dynamic inventory
///
/// The index is kept as the JSON document itself, so an index read back from
/// a cache file carries whatever that file held. Indexes assembled with
/// [`InventoryIndex::add_host`] list every grouped host in `_meta.hostvars`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryIndex(Map<String, Value>);

impl Default for InventoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryIndex {
    /// Create an index holding only the empty `_meta.hostvars` entry
    #[must_use]
    pub fn new() -> Self {
        let mut meta = Map::new();
        meta.insert(HOSTVARS.to_string(), Value::Object(Map::new()));

        let mut document = Map::new();
        document.insert(META.to_string(), Value::Object(meta));
        Self(document)
    }

    /// Append `host` to `group` and record its variables
    pub fn add_host(&mut self, group: &str, host: impl Into<String>, vars: HostVars) {
        let host = host.into();

        let members = self
            .0
            .entry(group)
            .or_insert_with(|| Value::Array(Vec::new()));
        match members {
            Value::Array(hosts) => hosts.push(Value::String(host.clone())),
            other => *other = Value::Array(vec![Value::String(host.clone())]),
        }

        let meta = object_entry(&mut self.0, META);
        object_entry(meta, HOSTVARS).insert(host, vars.into());
    }

    /// Hosts listed in `group`, or none if the group is unknown or is not a
    /// plain host list
    #[must_use]
    pub fn hosts(&self, group: &str) -> Vec<&str> {
        self.0
            .get(group)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .collect()
    }

    /// Variables for a single host
    #[must_use]
    pub fn host_vars(&self, host: &str) -> Option<&Value> {
        self.hostvars()?.get(host)
    }

    /// Number of hosts with variables
    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hostvars().map_or(0, Map::len)
    }

    fn hostvars(&self) -> Option<&Map<String, Value>> {
        self.0.get(META)?.get(HOSTVARS)?.as_object()
    }
}

/// The object under `key`, replacing a missing or non-object value
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = map
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(object) => object,
        _ => unreachable!("entry was just made an object"),
    }
}

/// Serialize `value` as pretty-printed JSON with every object's keys sorted
///
/// # Errors
/// Returns an error if `value` cannot be represented as JSON.
pub fn to_sorted_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    // Going through `Value` re-keys every object into a sorted map, including
    // flattened struct fields.
    let value = serde_json::to_value(value)?;
    serde_json::to_string_pretty(&value)
}
