//! `synth` command implementation.

use anyhow::{Context, Result};
use ingestion::{encode_samples, encode_samples_base64, SyntheticMotion};
use tracing::info;

use crate::cli::SynthArgs;
use crate::error::CliError;

/// Execute the `synth` command
pub fn run_synth(args: &SynthArgs) -> Result<()> {
    let motion = parse_pattern(&args.pattern, args.start_sample)?;
    let samples = motion.build();

    let written = if args.base64 {
        std::fs::write(&args.output, encode_samples_base64(&samples))
    } else {
        std::fs::write(&args.output, encode_samples(&samples))
    };
    written.with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        output = %args.output.display(),
        samples = samples.len(),
        pattern = %args.pattern,
        "Synthetic recording written"
    );
    println!(
        "Wrote {} samples ({}..{}) to {}",
        samples.len(),
        args.start_sample,
        args.start_sample as usize + samples.len(),
        args.output.display()
    );
    Ok(())
}

/// Parse `kind:count` segments; rest counts samples, the others count cycles
pub fn parse_pattern(pattern: &str, start_sample: u32) -> Result<SyntheticMotion, CliError> {
    let mut motion = SyntheticMotion::new(start_sample);

    for segment in pattern.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (kind, count) = segment
            .split_once(':')
            .ok_or_else(|| CliError::pattern(segment, "expected kind:count"))?;
        let count: usize = count
            .trim()
            .parse()
            .map_err(|e| CliError::pattern(segment, format!("bad count: {e}")))?;

        motion = match kind.trim() {
            "rest" => motion.rest(count),
            "walk" => motion.walk(count),
            "run" => motion.run(count),
            "shake" => motion.shake(count),
            other => {
                return Err(CliError::pattern(
                    segment,
                    format!("unknown kind '{other}' (rest, walk, run, shake)"),
                ))
            }
        };
    }

    if motion.is_empty() {
        return Err(CliError::pattern(pattern, "pattern produces no samples"));
    }
    Ok(motion)
}
