//! Blueprint loading with CLI overrides applied.

use anyhow::{Context, Result};
use contracts::{
    ContractError, DeviceId, ServiceBlueprint, SessionKey, SessionRegistry, StoreKind,
};
use tracing::info;

use crate::cli::EngineArgs;
use crate::error::CliError;

/// Split a `name=value` argument
pub fn parse_assignment(flag: &'static str, raw: &str) -> crate::error::Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(CliError::InvalidAssignment {
            flag,
            value: raw.to_string(),
        }),
    }
}

/// Load the configuration (defaults when the file is absent) and apply overrides
pub fn load_blueprint(args: &EngineArgs) -> Result<ServiceBlueprint> {
    let mut blueprint = config_loader::ConfigLoader::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if !args.config.exists() {
        info!(config = %args.config.display(), "Configuration file absent, using defaults");
    }

    if let Some(ref path) = args.store_path {
        info!(path = %path.display(), "Overriding store path from CLI");
        blueprint.store.kind = StoreKind::File;
        blueprint.store.path = path.clone();
    }
    if args.memory_store {
        info!("Using in-memory store");
        blueprint.store.kind = StoreKind::Memory;
    }
    for raw in &args.params {
        let (name, value) = parse_assignment("--param", raw)?;
        blueprint.params.set_field(&name, &value)?;
        info!(param = %name, value = %value, "Overriding default parameter from CLI");
    }
    if args.metrics_port != 0 {
        blueprint.observability.metrics_port = Some(args.metrics_port);
    }

    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;
    Ok(blueprint)
}

/// Named session (must exist) or the device's active session
pub async fn resolve_session_key<S: SessionRegistry>(
    registry: &S,
    device: &str,
    session: Option<&str>,
) -> Result<SessionKey> {
    let device_id = DeviceId::from(device);
    let key = match session {
        Some(session) => {
            let key = SessionKey::new(device_id, session);
            if !registry.session_exists(&key).await? {
                return Err(ContractError::unknown_session(device, session).into());
            }
            key
        }
        None => {
            let session_id = registry
                .active_session(&device_id)
                .await?
                .ok_or_else(|| CliError::NoActiveSession {
                    device: device.to_string(),
                })?;
            SessionKey::new(device_id, session_id)
        }
    };
    Ok(key)
}
