//! Configuration validation
//!
//! Rules:
//! - engine settings within range (positive period, non-zero timeouts)
//! - eviction interval not longer than the idle timeout
//! - default algorithm params (patch resolved against built-in defaults) pass
//!   range and cross-field checks
//! - file store needs a non-empty path
//! - log level parses as a tracing directive level

use contracts::{ContractError, ServiceBlueprint, StoreKind};
use validator::Validate;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Validate a ServiceBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    validate_engine(blueprint)?;
    validate_params(blueprint)?;
    validate_store(blueprint)?;
    validate_observability(blueprint)?;
    Ok(())
}

fn validate_engine(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let engine = &blueprint.engine;
    engine.validate().map_err(|e| {
        ContractError::config_validation("engine", e.to_string().replace('\n', "; "))
    })?;

    if engine.eviction_interval_s > engine.idle_timeout_s {
        return Err(ContractError::config_validation(
            "engine.eviction_interval_s",
            format!(
                "eviction_interval_s ({}) must be <= idle_timeout_s ({})",
                engine.eviction_interval_s, engine.idle_timeout_s
            ),
        ));
    }
    Ok(())
}

fn validate_params(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    blueprint.params.resolve().check()
}

fn validate_store(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    if blueprint.store.kind == StoreKind::File && blueprint.store.path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "store.path",
            "file store path cannot be empty",
        ));
    }
    Ok(())
}

fn validate_observability(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let level = blueprint.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ContractError::config_validation(
            "observability.log_level",
            format!(
                "unknown log level '{}', expected one of {:?}",
                blueprint.observability.log_level, LOG_LEVELS
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn minimal_blueprint() -> ServiceBlueprint {
        ServiceBlueprint::default()
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut bp = minimal_blueprint();
        bp.engine.nominal_period_ms = 0.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("engine"), "got: {err}");
    }

    #[test]
    fn test_eviction_interval_longer_than_timeout() {
        let mut bp = minimal_blueprint();
        bp.engine.idle_timeout_s = 30;
        bp.engine.eviction_interval_s = 60;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("eviction_interval_s"), "got: {err}");
    }

    #[test]
    fn test_params_cross_field_rule() {
        let mut bp = minimal_blueprint();
        bp.params.peak_window_n = Some(200);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("process_window_samples"), "got: {err}");
    }

    #[test]
    fn test_empty_store_path() {
        let mut bp = minimal_blueprint();
        bp.store.path = PathBuf::new();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");

        bp.store.kind = StoreKind::Memory;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_unknown_log_level() {
        let mut bp = minimal_blueprint();
        bp.observability.log_level = "chatty".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("unknown log level"), "got: {err}");
    }
}
