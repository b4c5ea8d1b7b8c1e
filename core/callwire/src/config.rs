// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0
//
// ConfigLoader reads the configuration file once and exposes lazy, cached
// accessors for each top level section. A section is parsed and validated
// the first time it is requested; missing sections take their defaults.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;
use tracing::debug;

use callwire_rpc::ServerConfig;
use callwire_store::StoreConfig;
use callwire_tracing::TracingConfiguration;

use crate::runtime::RuntimeConfiguration;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration - impossible to parse yaml")]
    InvalidYaml,
    #[error("invalid configuration - key {0} not valid")]
    InvalidKey(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("yaml parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("invalid configuration - environment variable {0} not set")]
    MissingEnv(String),
}

lazy_static! {
    static ref CONFIG_KEYS: HashSet<&'static str> =
        HashSet::from(["tracing", "runtime", "server", "store"]);
    static ref ENV_REFERENCE: Regex =
        Regex::new(r"\$\{env:([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env reference pattern");
}

/// Replace `${env:NAME}` references in every string of `value`
fn resolve_env(value: &mut Value) -> Result<(), ConfigError> {
    match value {
        Value::String(s) => {
            let mut missing = None;
            let resolved = ENV_REFERENCE.replace_all(s.as_str(), |caps: &Captures| {
                std::env::var(&caps[1]).unwrap_or_else(|_| {
                    missing.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                })
            });
            if let Some(name) = missing {
                return Err(ConfigError::MissingEnv(name));
            }
            *s = resolved.into_owned();
        }
        Value::Sequence(items) => {
            for item in items {
                resolve_env(item)?;
            }
        }
        Value::Mapping(mapping) => {
            for (_, item) in mapping.iter_mut() {
                resolve_env(item)?;
            }
        }
        Value::Tagged(tagged) => resolve_env(&mut tagged.value)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

pub struct ConfigLoader {
    root: Value,
    tracing: Option<TracingConfiguration>,
    runtime: Option<RuntimeConfiguration>,
    server: Option<ServerConfig>,
    store: Option<StoreConfig>,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root_keys = self
            .root
            .as_mapping()
            .map(|m| {
                m.keys()
                    .filter_map(|k| k.as_str())
                    .map(|s| s.to_string())
                    .collect::<Vec<String>>()
            })
            .unwrap_or_default();

        f.debug_struct("ConfigLoader")
            .field("root_keys", &root_keys)
            .field("tracing_loaded", &self.tracing.is_some())
            .field("runtime_loaded", &self.runtime.is_some())
            .field("server_loaded", &self.server.is_some())
            .field("store_loaded", &self.store.is_some())
            .finish()
    }
}

impl ConfigLoader {
    pub fn new(file_path: &str) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(file_path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {}", file_path, e)))?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let mut root: Value =
            serde_yaml::from_str(config_str).map_err(|_| ConfigError::InvalidYaml)?;

        // an empty document means all defaults
        if root.is_null() {
            root = Value::Mapping(Default::default());
        }

        let mapping = root.as_mapping().ok_or(ConfigError::InvalidYaml)?;
        for key in mapping.keys() {
            let k = key.as_str().ok_or(ConfigError::InvalidYaml)?;
            if !CONFIG_KEYS.contains(k) {
                return Err(ConfigError::InvalidKey(k.to_string()));
            }
        }

        resolve_env(&mut root)?;

        Ok(Self {
            root,
            tracing: None,
            runtime: None,
            server: None,
            store: None,
        })
    }

    fn section<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, ConfigError> {
        match self.root.get(key) {
            Some(value) if !value.is_null() => Ok(serde_yaml::from_value(value.clone())?),
            _ => Ok(T::default()),
        }
    }

    pub fn tracing(&mut self) -> Result<&TracingConfiguration, ConfigError> {
        let cfg = match self.tracing.take() {
            Some(cfg) => cfg,
            None => {
                let cfg: TracingConfiguration = self.section("tracing")?;
                debug!(?cfg, "Tracing configuration loaded");
                cfg
            }
        };
        Ok(self.tracing.insert(cfg))
    }

    pub fn runtime(&mut self) -> Result<&RuntimeConfiguration, ConfigError> {
        let cfg = match self.runtime.take() {
            Some(cfg) => cfg,
            None => {
                let cfg: RuntimeConfiguration = self.section("runtime")?;
                debug!(?cfg, "Runtime configuration loaded");
                cfg
            }
        };
        Ok(self.runtime.insert(cfg))
    }

    pub fn server(&mut self) -> Result<&ServerConfig, ConfigError> {
        let cfg = match self.server.take() {
            Some(cfg) => cfg,
            None => {
                let cfg: ServerConfig = self.section("server")?;
                cfg.validate()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                debug!(?cfg, "Server configuration loaded");
                cfg
            }
        };
        Ok(self.server.insert(cfg))
    }

    pub fn store(&mut self) -> Result<&StoreConfig, ConfigError> {
        let cfg = match self.store.take() {
            Some(cfg) => cfg,
            None => {
                let cfg: StoreConfig = self.section("store")?;
                debug!(?cfg, "Store configuration loaded");
                cfg
            }
        };
        Ok(self.store.insert(cfg))
    }
}
