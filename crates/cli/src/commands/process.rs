//! `process` command implementation.

use std::path::Path;

use anyhow::Result;
use bytes::Bytes;
use contracts::{ChunkPayload, ChunkRequest};
use tracing::{info, warn};

use crate::cli::ProcessArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::settings::load_blueprint;

/// Execute the `process` command
pub async fn run_process(args: &ProcessArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.engine)?;
    let chunks = build_chunks(args)?;

    info!(
        device = %args.session.device,
        chunks = chunks.len(),
        intent = ?args.session.intent(),
        "Processing chunk files"
    );

    let pipeline = Pipeline::open(PipelineConfig {
        blueprint,
        fail_fast: args.fail_fast,
        print_json: args.json,
    })
    .await?;

    drive(pipeline, chunks, args.json).await
}

/// Run the pipeline until done or interrupted, then print the summary
pub(super) async fn drive(pipeline: Pipeline, chunks: Vec<ChunkRequest>, json: bool) -> Result<()> {
    let shutdown = shutdown_signal();

    tokio::select! {
        result = pipeline.run(chunks) => {
            let stats = result?;
            if !json {
                stats.print_summary();
            }
        }
        _ = shutdown => {
            warn!("Received shutdown signal, stopping after the current chunk commit");
        }
    }

    pipeline.shutdown();
    Ok(())
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn build_chunks(args: &ProcessArgs) -> Result<Vec<ChunkRequest>, CliError> {
    let mut chunks = Vec::with_capacity(args.files.len());

    for (i, path) in args.files.iter().enumerate() {
        let data = std::fs::read(path).map_err(|e| CliError::input_read(path, e))?;
        let payload = if args.base64 {
            ChunkPayload::Base64(String::from_utf8_lossy(&data).trim().to_string())
        } else {
            ChunkPayload::Raw(Bytes::from(data))
        };

        let mut chunk = ChunkRequest {
            payload: Some(payload),
            ..ChunkRequest::raw(args.session.device.as_str(), chunk_name(path), Bytes::new())
        }
        .with_intent(args.session.intent());

        // reference and temperatures describe the first chunk
        if i == 0 {
            if let (Some(reference), Some(start)) = (args.reference_time_ms, args.start_sample) {
                chunk = chunk.with_reference(reference, start);
            }
            chunk = chunk.with_temperatures(args.temps.clone(), args.temp_start_ms);
        }
        chunks.push(chunk);
    }

    Ok(chunks)
}

pub(super) fn chunk_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
