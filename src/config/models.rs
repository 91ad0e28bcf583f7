//! Configuration data structures for the engine.
//!
//! These types map directly to YAML (also JSON / TOML) configuration files. They are
//! intentionally serde-friendly and include defaults so that minimal configs remain concise.
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{core::session::SessionSettings, stages::application::default_stack};

/// Top-level engine configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// The address the HTTP adapter binds to
    pub listen_addr: String,
    /// Module discovery and loading
    pub modules: ModulesConfig,
    /// Session store tuning
    pub session: SessionConfig,
    /// Ordered route table; first match wins
    pub routes: Vec<RouteEntryConfig>,
    /// Successor stack of the application root stage
    pub stack: Vec<String>,
    /// Data access defaults
    pub data: DataConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            modules: ModulesConfig::default(),
            session: SessionConfig::default(),
            routes: Vec::new(),
            stack: default_stack(),
            data: DataConfig::default(),
        }
    }
}

/// Module discovery configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ModulesConfig {
    /// Optional on-disk module root to scan; when absent, every compiled-in
    /// implementation is registered directly
    pub root: Option<String>,
    /// File extensions considered during discovery
    pub extensions: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            root: None,
            extensions: vec!["json".to_string()],
        }
    }
}

/// Session store configuration. Durations use humantime notation
/// (e.g. "1h", "30m", "1d").
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle lifetime of a session
    pub max_age: String,
    /// Interval between expired-session sweeps
    pub sweep_interval: String,
    /// Length of generated session keys, in random bytes (hex doubles it)
    pub key_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: "1h".to_string(),
            sweep_interval: "1d".to_string(),
            key_size: 24,
        }
    }
}

impl SessionConfig {
    /// Parse the configured durations into store settings.
    pub fn to_settings(&self) -> Result<SessionSettings> {
        let max_age = humantime::parse_duration(&self.max_age)
            .wrap_err_with(|| format!("Invalid session.max_age '{}'", self.max_age))?;
        let sweep_interval = humantime::parse_duration(&self.sweep_interval)
            .wrap_err_with(|| format!("Invalid session.sweep_interval '{}'", self.sweep_interval))?;
        Ok(SessionSettings {
            max_age,
            sweep_interval,
            key_size: self.key_size,
            ..SessionSettings::default()
        })
    }
}

/// One route table entry: a template plus preset context fields.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RouteEntryConfig {
    /// `"METHOD /path"` template; `{name}` segments capture into the context
    pub route: String,
    /// Fields merged into the context on match; a preset overrides a capture
    /// of the same name, and `method: "skip"` drops the request
    #[serde(default)]
    pub preset: Map<String, Value>,
}

/// Data access defaults
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Default storage driver module prefix (e.g. "Json" selects "JsonDriver")
    pub driver: String,
    /// Directory holding the JSON document stores, one file per data type
    pub documents_root: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            driver: "Json".to_string(),
            documents_root: "./documents".to_string(),
        }
    }
}

impl EngineConfig {
    /// Route table entries in `(template, preset)` form.
    pub fn route_pairs(&self) -> Vec<(String, Map<String, Value>)> {
        self.routes
            .iter()
            .map(|entry| (entry.route.clone(), entry.preset.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = EngineConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.stack.first().map(String::as_str), Some("Router"));
        assert_eq!(config.data.driver, "Json");
        assert_eq!(config.modules.extensions, vec!["json".to_string()]);
    }

    #[test]
    fn test_session_durations_parse() {
        let settings = SessionConfig::default().to_settings().unwrap();
        assert_eq!(settings.max_age.as_secs(), 3600);
        assert_eq!(settings.sweep_interval.as_secs(), 86_400);
        assert_eq!(settings.key_size, 24);
    }

    #[test]
    fn test_invalid_session_duration_is_an_error() {
        let config = SessionConfig {
            max_age: "whenever".to_string(),
            ..SessionConfig::default()
        };
        assert!(config.to_settings().is_err());
    }
}
