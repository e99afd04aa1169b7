//! `info` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{
    AlgorithmParams, DeviceId, ServiceBlueprint, SessionKey, SessionRegistry, SessionSnapshot,
};
use serde::Serialize;
use step_engine::StepEngine;
use store::Store;
use tracing::info;

use crate::cli::InfoArgs;
use crate::settings::load_blueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    engine: EngineInfo,
    store: StoreInfo,
    observability: ObservabilityInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<AlgorithmParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<DeviceInfo>,
}

#[derive(Serialize)]
struct EngineInfo {
    nominal_period_ms: f64,
    idle_timeout_s: u64,
    eviction_interval_s: u64,
}

#[derive(Serialize)]
struct StoreInfo {
    kind: String,
    path: String,
}

#[derive(Serialize)]
struct ObservabilityInfo {
    log_format: String,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

#[derive(Serialize)]
struct DeviceInfo {
    device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_session: Option<String>,
    sessions: Vec<SessionSnapshot>,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.engine.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.engine)?;

    let device = match args.device {
        Some(ref device) => Some(load_device_info(&blueprint, device).await?),
        None => None,
    };
    let info = build_config_info(&blueprint, args, device);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

async fn load_device_info(blueprint: &ServiceBlueprint, device: &str) -> Result<DeviceInfo> {
    let store = store::open_store(&blueprint.store)
        .await
        .context("Failed to open store")?;
    let engine: StepEngine<Store> = StepEngine::new(
        Arc::new(store),
        blueprint.engine.clone(),
        blueprint.params.resolve(),
    )
    .context("Invalid default algorithm params")?;

    let device_id = DeviceId::from(device);
    let active = engine.store().active_session(&device_id).await?;

    let mut sessions = Vec::new();
    for session_id in engine.store().sessions_of(&device_id).await {
        let key = SessionKey::new(device_id.clone(), session_id);
        sessions.push(engine.session_snapshot(&key).await?);
    }

    Ok(DeviceInfo {
        device_id: device.to_string(),
        active_session: active.map(|id| id.to_string()),
        sessions,
    })
}

fn build_config_info(
    blueprint: &ServiceBlueprint,
    args: &InfoArgs,
    device: Option<DeviceInfo>,
) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        engine: EngineInfo {
            nominal_period_ms: blueprint.engine.nominal_period_ms,
            idle_timeout_s: blueprint.engine.idle_timeout_s,
            eviction_interval_s: blueprint.engine.eviction_interval_s,
        },
        store: StoreInfo {
            kind: format!("{:?}", blueprint.store.kind),
            path: blueprint.store.path.display().to_string(),
        },
        observability: ObservabilityInfo {
            log_format: format!("{:?}", blueprint.observability.log_format),
            log_level: blueprint.observability.log_level.clone(),
            metrics_port: blueprint.observability.metrics_port,
        },
        params: args.show_params.then(|| blueprint.params.resolve()),
        device,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== Collar Steps Configuration ===\n");

    println!("Engine");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Nominal period: {} ms", info.engine.nominal_period_ms);
    println!("   ├─ Idle timeout: {} s", info.engine.idle_timeout_s);
    println!("   └─ Eviction interval: {} s", info.engine.eviction_interval_s);

    println!("\nStore");
    println!("   ├─ Kind: {}", info.store.kind);
    println!("   └─ Path: {}", info.store.path);

    println!("\nObservability");
    println!("   ├─ Log format: {}", info.observability.log_format);
    println!("   ├─ Log level: {}", info.observability.log_level);
    match info.observability.metrics_port {
        Some(port) => println!("   └─ Metrics port: {}", port),
        None => println!("   └─ Metrics port: disabled"),
    }

    if let Some(ref params) = info.params {
        println!("\nAlgorithm Parameters");
        if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(params) {
            let count = fields.len();
            for (i, (name, value)) in fields.iter().enumerate() {
                let prefix = if i + 1 == count { "└─" } else { "├─" };
                println!("   {} {}: {}", prefix, name, value);
            }
        }
    }

    if let Some(ref device) = info.device {
        println!("\nDevice {} ({} sessions)", device.device_id, device.sessions.len());
        for (i, snapshot) in device.sessions.iter().enumerate() {
            let is_last = i + 1 == device.sessions.len();
            let prefix = if is_last { "└─" } else { "├─" };
            let active = device.active_session.as_deref() == Some(snapshot.key.session_id.as_str());
            println!(
                "   {} {}{}: {} steps ({} running, {} shake removed), last sample {}",
                prefix,
                snapshot.key.session_id,
                if active { " [active]" } else { "" },
                snapshot.cumulative_steps,
                snapshot.running_steps,
                snapshot.shake_removed,
                snapshot
                    .last_sample_number
                    .map_or_else(|| "-".to_string(), |n| n.to_string()),
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::EngineArgs;
    use contracts::{ChunkRecord, StepStore, StoreKind};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn make_args(store_path: PathBuf, device: Option<&str>) -> InfoArgs {
        InfoArgs {
            engine: EngineArgs {
                config: PathBuf::from("/nonexistent/collar-steps.toml"),
                store_path: Some(store_path),
                memory_store: false,
                params: Vec::new(),
                metrics_port: 0,
            },
            device: device.map(str::to_string),
            show_params: true,
            json: true,
        }
    }

    #[tokio::test]
    async fn test_device_info_from_file_store() {
        let dir = tempdir().unwrap();
        let args = make_args(dir.path().to_path_buf(), Some("collar-01"));
        let blueprint = load_blueprint(&args.engine).unwrap();
        assert_eq!(blueprint.store.kind, StoreKind::File);

        {
            let store = store::FileStore::open(dir.path()).await.unwrap();
            let device = DeviceId::from("collar-01");
            let session_id = store.start_session(&device).await.unwrap();
            store
                .record_chunk(&ChunkRecord {
                    device_id: device,
                    session_id,
                    chunk_name: "a.bin".to_string(),
                    steps: 180,
                    running_steps: 0,
                    shake_removed: 0,
                    samples_processed: 1000,
                    first_sample_number: Some(0),
                    last_sample_number: Some(999),
                    temp_avg_c: None,
                    temperatures: Vec::new(),
                })
                .await
                .unwrap();
        }

        let device = load_device_info(&blueprint, "collar-01").await.unwrap();
        assert_eq!(device.sessions.len(), 1);
        assert_eq!(device.sessions[0].cumulative_steps, 180);
        assert!(!device.sessions[0].resident);
        assert!(device.active_session.is_some());

        let info = build_config_info(&blueprint, &args, Some(device));
        assert!(info.params.is_some());
        assert!(serde_json::to_string(&info).is_ok());
    }
}
