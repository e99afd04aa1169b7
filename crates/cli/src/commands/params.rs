//! `params` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{AlgorithmParams, AlgorithmParamsPatch, SessionKey};
use serde::Serialize;
use step_engine::StepEngine;
use tracing::info;

use crate::cli::ParamsArgs;
use crate::settings::{load_blueprint, parse_assignment, resolve_session_key};

#[derive(Serialize)]
struct ParamsReport<'a> {
    device_id: &'a str,
    session_id: &'a str,
    updated: bool,
    params: &'a AlgorithmParams,
}

/// Execute the `params` command
pub async fn run_params(args: &ParamsArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.engine)?;
    let store = store::open_store(&blueprint.store)
        .await
        .context("Failed to open store")?;
    let engine = StepEngine::new(
        Arc::new(store),
        blueprint.engine.clone(),
        blueprint.params.resolve(),
    )
    .context("Invalid default algorithm params")?;

    let key = resolve_session_key(engine.store().as_ref(), &args.device, args.session.as_deref())
        .await?;

    let patch = build_patch(&args.set)?;
    let params = if patch.is_empty() {
        engine.session_params(&key).await?
    } else {
        let params = engine
            .update_params(&key, &patch)
            .await
            .with_context(|| format!("Failed to update params of {}", key))?;
        info!(session = %key, fields = args.set.len(), "Session params updated");
        params
    };

    if args.json {
        let report = ParamsReport {
            device_id: &key.device_id,
            session_id: &key.session_id,
            updated: !patch.is_empty(),
            params: &params,
        };
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize params")?;
        println!("{}", json);
    } else {
        print_params(&key, &params, !patch.is_empty())?;
    }

    Ok(())
}

fn build_patch(assignments: &[String]) -> Result<AlgorithmParamsPatch> {
    let mut patch = AlgorithmParamsPatch::default();
    for raw in assignments {
        let (name, value) = parse_assignment("--set", raw)?;
        patch.set_field(&name, &value)?;
    }
    Ok(patch)
}

fn print_params(key: &SessionKey, params: &AlgorithmParams, updated: bool) -> Result<()> {
    let value = serde_json::to_value(params).context("Failed to serialize params")?;

    let status = if updated { "updated" } else { "effective" };
    println!("Session {} ({} params)", key, status);
    if let Some(fields) = value.as_object() {
        let count = fields.len();
        for (i, (name, value)) in fields.iter().enumerate() {
            let prefix = if i + 1 == count { "└─" } else { "├─" };
            println!("   {} {}: {}", prefix, name, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_patch() {
        let patch = build_patch(&[
            "peak_threshold=11.5".to_string(),
            "process_window_samples=128".to_string(),
        ])
        .unwrap();
        assert_eq!(patch.peak_threshold, Some(11.5));
        assert_eq!(patch.process_window_samples, Some(128));
        assert!(build_patch(&[]).unwrap().is_empty());
        assert!(build_patch(&["unknown=1".to_string()]).is_err());
        assert!(build_patch(&["peak_threshold".to_string()]).is_err());
    }
}
