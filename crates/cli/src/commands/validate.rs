//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ServiceBlueprint, StoreKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    store_kind: String,
    store_path: String,
    idle_timeout_s: u64,
    eviction_interval_s: u64,
    overridden_params: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let overridden_params = serde_json::to_value(&blueprint.params)
                .ok()
                .and_then(|v| v.as_object().map(|o| o.values().filter(|v| !v.is_null()).count()))
                .unwrap_or(0);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    store_kind: format!("{:?}", blueprint.store.kind),
                    store_path: blueprint.store.path.display().to_string(),
                    idle_timeout_s: blueprint.engine.idle_timeout_s,
                    eviction_interval_s: blueprint.engine.eviction_interval_s,
                    overridden_params,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ServiceBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.store.kind == StoreKind::Memory {
        warnings.push("store.kind is memory - session totals will not survive a restart".to_string());
    }

    let params = blueprint.params.resolve();
    if params.peak_threshold >= params.shake_start_threshold {
        warnings.push(format!(
            "params.peak_threshold ({}) >= shake_start_threshold ({}) - no peak can start a shake span",
            params.peak_threshold, params.shake_start_threshold
        ));
    }
    if params.run_end_threshold_high > params.run_start_threshold {
        warnings.push(format!(
            "params.run_end_threshold_high ({}) > run_start_threshold ({}) - running bouts end on their second peak",
            params.run_end_threshold_high, params.run_start_threshold
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Store: {} ({})", summary.store_kind, summary.store_path);
            println!(
                "  Eviction: idle {}s, every {}s",
                summary.idle_timeout_s, summary.eviction_interval_s
            );
            println!("  Overridden params: {}", summary.overridden_params);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
