//! `replay` command implementation.

use anyhow::Result;
use bytes::Bytes;
use contracts::{ChunkRequest, SAMPLE_RECORD_SIZE};
use tracing::info;

use super::process::{chunk_name, drive};
use crate::cli::ReplayArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::settings::load_blueprint;

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.engine)?;
    let data = std::fs::read(&args.input).map_err(|e| CliError::input_read(&args.input, e))?;

    let parts = split_recording(&Bytes::from(data), args.chunk_samples as usize, args.overlap);
    let base_name = chunk_name(&args.input);
    let chunks: Vec<ChunkRequest> = parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            ChunkRequest::raw(
                args.session.device.as_str(),
                format!("{base_name}#{i}"),
                part,
            )
            .with_intent(args.session.intent())
        })
        .collect();

    info!(
        input = %args.input.display(),
        chunks = chunks.len(),
        chunk_samples = args.chunk_samples,
        overlap = args.overlap,
        "Replaying recording"
    );

    let pipeline = Pipeline::open(PipelineConfig {
        blueprint,
        fail_fast: true,
        print_json: args.json,
    })
    .await?;

    drive(pipeline, chunks, args.json).await
}

/// Split a raw recording into chunks of `chunk_samples` records
///
/// Each chunk after the first also repeats up to `overlap` trailing records of
/// the previous one. A trailing partial record stays on the last chunk.
pub fn split_recording(data: &Bytes, chunk_samples: usize, overlap: usize) -> Vec<Bytes> {
    let chunk_samples = chunk_samples.max(1);
    let records = data.len() / SAMPLE_RECORD_SIZE;
    if records == 0 {
        return if data.is_empty() {
            Vec::new()
        } else {
            vec![data.clone()]
        };
    }

    let mut parts = Vec::with_capacity(records.div_ceil(chunk_samples));
    let mut start = 0;
    while start < records {
        let end = (start + chunk_samples).min(records);
        let from = if start == 0 {
            0
        } else {
            start.saturating_sub(overlap)
        };
        let to = if end == records {
            data.len()
        } else {
            end * SAMPLE_RECORD_SIZE
        };
        parts.push(data.slice(from * SAMPLE_RECORD_SIZE..to));
        start = end;
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_recording(records: usize, extra: usize) -> Bytes {
        Bytes::from(vec![0u8; records * SAMPLE_RECORD_SIZE + extra])
    }

    #[test]
    fn test_split_even() {
        let parts = split_recording(&make_recording(10, 0), 4, 0);
        let sizes: Vec<_> = parts.iter().map(|p| p.len() / SAMPLE_RECORD_SIZE).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_split_with_overlap_and_tail() {
        let parts = split_recording(&make_recording(10, 7), 4, 2);
        let sizes: Vec<_> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(
            sizes,
            vec![4 * SAMPLE_RECORD_SIZE, 6 * SAMPLE_RECORD_SIZE, 4 * SAMPLE_RECORD_SIZE + 7]
        );
    }

    #[test]
    fn test_split_short_inputs() {
        assert!(split_recording(&Bytes::new(), 4, 0).is_empty());
        assert_eq!(split_recording(&make_recording(0, 5), 4, 0).len(), 1);
    }
}
