//! Per-host connection parameters

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{KindConfig, TemplateSet};
use crate::error::InventoryError;
use crate::template::Template;
use crate::types::{ConnectionParams, Instance};

/// Parsed `user`, `host` and `port` templates; absent keys stay `None`
#[derive(Debug, Clone, Default)]
struct CompiledSet {
    user: Option<Template>,
    host: Option<Template>,
    port: Option<Template>,
}

impl CompiledSet {
    fn compile(set: &TemplateSet) -> Result<Self, InventoryError> {
        let parse = |source: &Option<String>| source.as_deref().map(Template::parse).transpose();
        Ok(Self {
            user: parse(&set.user)?,
            host: parse(&set.host)?,
            port: parse(&set.port)?,
        })
    }

    fn get(&self, key: &str) -> Option<&Template> {
        match key {
            "user" => self.user.as_ref(),
            "host" => self.host.as_ref(),
            "port" => self.port.as_ref(),
            _ => None,
        }
    }

    fn templates(&self) -> impl Iterator<Item = &Template> {
        [&self.user, &self.host, &self.port].into_iter().flatten()
    }
}

/// Resolves `user`, `host` and `port` templates for the hosts of one kind
///
/// Kind-level templates come from `[<kind>]`; a `[<kind>."<host>"]` table
/// overrides individual keys. Every template is parsed once, up front.
pub struct ConnectionResolver {
    kind: String,
    defaults: CompiledSet,
    hosts: BTreeMap<String, CompiledSet>,
}

impl ConnectionResolver {
    /// Parse the templates of `kind`
    ///
    /// # Errors
    /// Returns `Template` if any kind-level or host template is malformed.
    pub fn compile(kind: &str, config: &KindConfig) -> Result<Self, InventoryError> {
        let defaults = CompiledSet::compile(&config.defaults)?;
        let hosts = config
            .hosts
            .iter()
            .map(|(host, set)| CompiledSet::compile(set).map(|compiled| (host.clone(), compiled)))
            .collect::<Result<BTreeMap<_, _>, InventoryError>>()?;

        let fields: Vec<&str> = defaults
            .templates()
            .chain(hosts.values().flat_map(|set| set.templates()))
            .flat_map(|template| template.fields())
            .collect();
        debug!(kind, overrides = hosts.len(), ?fields, "compiled connection templates");

        Ok(Self {
            kind: kind.to_string(),
            defaults,
            hosts,
        })
    }

    /// Resolve connection parameters for `host`
    ///
    /// # Errors
    /// Returns `MissingField` if a template key is absent for this host, or a
    /// template references a field the record lacks.
    pub fn resolve(&self, host: &str, instance: &Instance) -> Result<ConnectionParams, InventoryError> {
        let specific = self.hosts.get(host);
        let section = format!("[{}] for host {host}", self.kind);

        let render = |key: &str| -> Result<String, InventoryError> {
            specific
                .and_then(|set| set.get(key))
                .or_else(|| self.defaults.get(key))
                .ok_or_else(|| InventoryError::missing(key, section.as_str()))?
                .render(instance)
        };

        let params = ConnectionParams {
            user: render("user")?,
            host: render("host")?,
            port: render("port")?,
        };

        debug!(kind = %self.kind, host, user = %params.user, addr = %params.host, port = %params.port, "resolved connection");

        Ok(params)
    }
}
