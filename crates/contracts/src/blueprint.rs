//! ServiceBlueprint - Config Loader output
//!
//! Describes a complete service configuration: engine settings, default
//! algorithm parameters, storage backend and observability.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{AlgorithmParamsPatch, EngineSettings};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    pub engine: EngineSettings,

    /// Default algorithm parameters for sessions without stored params.
    /// Absent fields resolve to the built-in defaults.
    #[serde(default)]
    pub params: AlgorithmParamsPatch,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// Storage backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Volatile, process-local
    Memory,
    /// JSON files under `path`
    #[default]
    File,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./collar-data")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_store_path(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus exporter port (absent = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let bp: ServiceBlueprint = serde_json::from_str("{}").unwrap();
        assert_eq!(bp.version, ConfigVersion::V1);
        assert_eq!(bp.engine, EngineSettings::default());
        assert!(bp.params.is_empty());
        assert_eq!(bp.store.kind, StoreKind::File);
        assert_eq!(bp.store.path, PathBuf::from("./collar-data"));
        assert_eq!(bp.observability.log_level, "info");
        assert_eq!(bp.observability.metrics_port, None);
    }

    #[test]
    fn test_store_kind_snake_case() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"kind": "memory"}"#).unwrap();
        assert_eq!(cfg.kind, StoreKind::Memory);
    }
}
