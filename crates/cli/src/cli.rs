//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use contracts::{ObservabilitySettings, SessionIntent, SessionKey};
use std::path::PathBuf;

/// Collar Steps - streaming step counter for collar motion data
#[derive(Parser, Debug)]
#[command(
    name = "collar-steps",
    author,
    version,
    about = "Step counting engine for collar motion-sensor chunks",
    long_about = "Decodes 32-byte motion sample chunks from a wearable collar, maps them onto \n\
                  the wall clock and counts steps per session, filtering running bouts and \n\
                  leg-shake artifacts. Session totals persist in the configured store."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "COLLAR_STEPS_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "COLLAR_STEPS_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process chunk files in order
    Process(ProcessArgs),

    /// Split one recording into chunks and process them
    Replay(ReplayArgs),

    /// Write a synthetic motion recording
    Synth(SynthArgs),

    /// Show or update a session's algorithm parameters
    Params(ParamsArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration and session information
    Info(InfoArgs),
}

/// Configuration and store selection shared by engine commands
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when absent
    #[arg(
        short,
        long,
        default_value = "collar-steps.toml",
        env = "COLLAR_STEPS_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the file store directory
    #[arg(long, env = "COLLAR_STEPS_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Use a volatile in-memory store
    #[arg(long, conflicts_with = "store_path")]
    pub memory_store: bool,

    /// Override a default algorithm parameter (repeatable, `name=value`)
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Metrics server port (0 = use configuration)
    #[arg(long, default_value = "0", env = "COLLAR_STEPS_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Device and session selection
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Device identifier
    #[arg(short, long, env = "COLLAR_STEPS_DEVICE")]
    pub device: String,

    /// Explicit session id (default: the device's active session)
    #[arg(short, long, conflicts_with = "new_session")]
    pub session: Option<String>,

    /// Start a new session with the first chunk
    #[arg(long)]
    pub new_session: bool,
}

impl SessionArgs {
    /// Intent for the first chunk of a run
    pub fn intent(&self) -> SessionIntent {
        match (&self.session, self.new_session) {
            (Some(session), _) => SessionIntent::Explicit(session.as_str().into()),
            (None, true) => SessionIntent::StartNew,
            (None, false) => SessionIntent::Active,
        }
    }

    pub fn key(&self) -> Option<SessionKey> {
        self.session
            .as_deref()
            .map(|session| SessionKey::new(self.device.as_str(), session))
    }
}

/// Arguments for the `process` command
#[derive(Parser, Debug, Clone)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Chunk files, processed in the given order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Chunk files hold base64 text instead of raw records
    #[arg(long)]
    pub base64: bool,

    /// Epoch ms at which `--start-sample` was taken (first chunk)
    #[arg(long, requires = "start_sample")]
    pub reference_time_ms: Option<i64>,

    /// Sample number observed at `--reference-time-ms`
    #[arg(long, requires = "reference_time_ms")]
    pub start_sample: Option<u32>,

    /// Temperature readings for the first chunk, one per second
    #[arg(long, value_delimiter = ',')]
    pub temps: Vec<f64>,

    /// Epoch ms of the first temperature reading
    #[arg(long)]
    pub temp_start_ms: Option<i64>,

    /// Print each chunk outcome as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Stop at the first rejected chunk
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Raw recording (concatenated 32-byte sample records)
    pub input: PathBuf,

    /// Samples per chunk
    #[arg(long, default_value = "256", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_samples: u64,

    /// Resend this many trailing samples of the previous chunk with each chunk
    #[arg(long, default_value = "0")]
    pub overlap: usize,

    /// Print each chunk outcome as a JSON line
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `synth` command
#[derive(Parser, Debug, Clone)]
pub struct SynthArgs {
    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Comma separated segments, e.g. `rest:16,walk:10,run:8,shake:6`
    #[arg(short, long, default_value = "rest:16,walk:20,rest:240")]
    pub pattern: String,

    /// Sample number of the first sample
    #[arg(long, default_value = "0")]
    pub start_sample: u32,

    /// Write base64 text instead of raw records
    #[arg(long)]
    pub base64: bool,
}

/// Arguments for the `params` command
#[derive(Parser, Debug, Clone)]
pub struct ParamsArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Device identifier
    #[arg(short, long, env = "COLLAR_STEPS_DEVICE")]
    pub device: String,

    /// Session id (default: the device's active session)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Update a parameter (repeatable, `name=value`)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "collar-steps.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Show the sessions of this device
    #[arg(short, long)]
    pub device: Option<String>,

    /// Show all 16 algorithm parameters
    #[arg(long = "params")]
    pub show_params: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

impl Cli {
    /// Logging settings from the global flags
    ///
    /// `--quiet` wins over `-v`. The exporter is started per command, not here.
    pub fn observability_settings(&self) -> ObservabilitySettings {
        let level = match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        ObservabilitySettings {
            log_format: self.log_format.clone().into(),
            log_level: level.to_string(),
            metrics_port: None,
        }
    }
}
