//! Attribute normalization
//!
//! Instance records report addresses in several nested shapes. This module
//! lifts them into flat fields:
//!
//! - `<Prefix>IpAddress: {IpAddress: [a, ..]}` adds `<Prefix>Ip: a`
//! - `<Prefix>EipAddress: {IpAddress: [a, b]}` adds `EipAddress: [a, b]`
//! - `<Prefix>VpcAttributes: {PrivateIpAddress: {IpAddress: [a, ..]}}` adds `Vip: a`
//!
//! Matching only ever looks at the fields the record arrived with.

use serde_json::{Map, Value};

use crate::types::Instance;

const IP_SUFFIX: &str = "IpAddress";
const EIP_SUFFIX: &str = "EipAddress";
const VPC_SUFFIX: &str = "VpcAttributes";
const ADDRESS_SUFFIX: &str = "Address";

/// Add derived IP fields to `instance`; original fields are never removed
#[must_use]
pub fn extract_ips(mut instance: Instance) -> Instance {
    let derived = derived_fields(&instance);
    instance.extend(derived);
    instance
}

/// Derived fields in application order: primary IPs, then elastic IPs, then
/// the VPC address. A later pass overwrites an earlier one on name clashes.
fn derived_fields(original: &Instance) -> Map<String, Value> {
    let mut derived = Map::new();

    for (key, value) in original {
        if key.ends_with(IP_SUFFIX)
            && !key.ends_with(EIP_SUFFIX)
            && let Some(first) = ip_list(value).and_then(|ips| ips.first())
        {
            let name = &key[..key.len() - ADDRESS_SUFFIX.len()];
            derived.insert(name.to_string(), first.clone());
        }
    }

    for (key, value) in original {
        if key.ends_with(EIP_SUFFIX)
            && let Some(ips) = ip_list(value)
        {
            derived.insert(EIP_SUFFIX.to_string(), Value::Array(ips.clone()));
        }
    }

    for (key, value) in original {
        if key.ends_with(VPC_SUFFIX)
            && let Some(first) = value
                .get("PrivateIpAddress")
                .and_then(ip_list)
                .and_then(|ips| ips.first())
        {
            derived.insert("Vip".to_string(), first.clone());
        }
    }

    derived
}

/// The non-empty `IpAddress` sequence of a mapping value
fn ip_list(value: &Value) -> Option<&Vec<Value>> {
    value
        .as_object()?
        .get(IP_SUFFIX)?
        .as_array()
        .filter(|ips| !ips.is_empty())
}
