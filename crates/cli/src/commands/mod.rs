//! Command implementations.

mod info;
mod params;
mod process;
mod replay;
mod synth;
mod validate;

pub use info::run_info;
pub use params::run_params;
pub use process::run_process;
pub use replay::run_replay;
pub use synth::run_synth;
pub use validate::run_validate;
