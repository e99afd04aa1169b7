//! Step algorithm and engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// The 16 tunable step-algorithm parameters, scoped per session.
///
/// Magnitudes are in m/s², windows in samples, variance in (rad/s)².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AlgorithmParams {
    /// Algorithm sample rate (Hz)
    #[validate(range(exclusive_min = 0.0))]
    pub sample_rate_hz: f64,

    /// Minimum filtered magnitude for a peak to count as a step
    pub peak_threshold: f64,

    /// Half-width of the strict local-maximum window
    #[validate(range(min = 1))]
    pub peak_window_n: usize,

    /// Half-width of the strict local-minimum window
    #[validate(range(min = 1))]
    pub valley_window_n: usize,

    /// Moving-average length
    #[validate(range(min = 1))]
    pub filter_window: usize,

    /// History length that triggers classification of buffered peaks
    #[validate(range(min = 3))]
    pub process_window_samples: usize,

    pub run_start_threshold: f64,
    pub run_end_threshold_high: f64,
    pub run_end_threshold_low: f64,
    pub run_peak_valley_diff: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub run_scaling_factor: f64,

    /// Samples per step at baseline cadence
    #[validate(range(min = 1))]
    pub baseline_step_samples: usize,

    pub shake_start_threshold: f64,
    pub shake_peak_valley_diff: f64,
    pub shake_regional_peak_max: f64,

    #[validate(range(min = 0.0))]
    pub shake_variance_threshold: f64,
}

impl Default for AlgorithmParams {
    fn default() -> Self {
        Self {
            sample_rate_hz: 32.0,
            peak_threshold: 10.5,
            peak_window_n: 4,
            valley_window_n: 4,
            filter_window: 5,
            process_window_samples: 256,
            run_start_threshold: 22.0,
            run_end_threshold_high: 20.0,
            run_end_threshold_low: 12.0,
            run_peak_valley_diff: 6.0,
            run_scaling_factor: 1.2,
            baseline_step_samples: 16,
            shake_start_threshold: 17.0,
            shake_peak_valley_diff: 8.0,
            shake_regional_peak_max: 21.0,
            shake_variance_threshold: 0.05,
        }
    }
}

impl AlgorithmParams {
    /// Range rules plus the cross-field constraints the detector relies on.
    pub fn check(&self) -> Result<(), ContractError> {
        self.validate().map_err(|e| {
            ContractError::config_validation("params", e.to_string().replace('\n', "; "))
        })?;

        let widest = 2 * self.peak_window_n.max(self.valley_window_n) + 1;
        if widest >= self.process_window_samples {
            return Err(ContractError::config_validation(
                "params.process_window_samples",
                format!(
                    "process_window_samples ({}) must exceed the widest detection window ({widest})",
                    self.process_window_samples
                ),
            ));
        }

        if self.shake_start_threshold >= self.shake_regional_peak_max {
            return Err(ContractError::config_validation(
                "params.shake_start_threshold",
                format!(
                    "shake_start_threshold ({}) must be < shake_regional_peak_max ({})",
                    self.shake_start_threshold, self.shake_regional_peak_max
                ),
            ));
        }

        let thresholds = [
            ("peak_threshold", self.peak_threshold),
            ("run_start_threshold", self.run_start_threshold),
            ("run_end_threshold_high", self.run_end_threshold_high),
            ("run_end_threshold_low", self.run_end_threshold_low),
            ("run_peak_valley_diff", self.run_peak_valley_diff),
            ("shake_peak_valley_diff", self.shake_peak_valley_diff),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() {
                return Err(ContractError::config_validation(
                    format!("params.{name}"),
                    "must be a finite number",
                ));
            }
        }

        Ok(())
    }
}

/// Partial update of [`AlgorithmParams`]; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmParamsPatch {
    pub sample_rate_hz: Option<f64>,
    pub peak_threshold: Option<f64>,
    pub peak_window_n: Option<usize>,
    pub valley_window_n: Option<usize>,
    pub filter_window: Option<usize>,
    pub process_window_samples: Option<usize>,
    pub run_start_threshold: Option<f64>,
    pub run_end_threshold_high: Option<f64>,
    pub run_end_threshold_low: Option<f64>,
    pub run_peak_valley_diff: Option<f64>,
    pub run_scaling_factor: Option<f64>,
    pub baseline_step_samples: Option<usize>,
    pub shake_start_threshold: Option<f64>,
    pub shake_peak_valley_diff: Option<f64>,
    pub shake_regional_peak_max: Option<f64>,
    pub shake_variance_threshold: Option<f64>,
}

macro_rules! patch_fields {
    ($($field:ident),+ $(,)?) => {
        impl AlgorithmParamsPatch {
            /// Field names accepted by [`AlgorithmParamsPatch::set_field`]
            pub const FIELD_NAMES: &'static [&'static str] = &[$(stringify!($field)),+];

            /// Merge into `base`, returning the updated record
            pub fn merge_into(&self, base: &AlgorithmParams) -> AlgorithmParams {
                let mut merged = base.clone();
                $(
                    if let Some(value) = self.$field {
                        merged.$field = value;
                    }
                )+
                merged
            }

            /// Set one field from its textual form (`key=value` CLI overrides)
            pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), ContractError> {
                match name {
                    $(
                        stringify!($field) => {
                            let parsed = value.trim().parse().map_err(|e| {
                                ContractError::config_validation(
                                    format!("params.{name}"),
                                    format!("cannot parse '{value}': {e}"),
                                )
                            })?;
                            self.$field = Some(parsed);
                            Ok(())
                        }
                    )+
                    _ => Err(ContractError::config_validation(
                        format!("params.{name}"),
                        "unknown algorithm parameter",
                    )),
                }
            }

            /// True when no field is set
            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())+
            }
        }
    };
}

patch_fields!(
    sample_rate_hz,
    peak_threshold,
    peak_window_n,
    valley_window_n,
    filter_window,
    process_window_samples,
    run_start_threshold,
    run_end_threshold_high,
    run_end_threshold_low,
    run_peak_valley_diff,
    run_scaling_factor,
    baseline_step_samples,
    shake_start_threshold,
    shake_peak_valley_diff,
    shake_regional_peak_max,
    shake_variance_threshold,
);

impl AlgorithmParamsPatch {
    /// Resolve against the documented defaults
    pub fn resolve(&self) -> AlgorithmParams {
        self.merge_into(&AlgorithmParams::default())
    }
}

/// Session step engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineSettings {
    /// Nominal device sample period used for timestamp mapping (ms)
    #[validate(range(exclusive_min = 0.0))]
    pub nominal_period_ms: f64,

    /// Evict in-memory session state after this much inactivity (s)
    #[validate(range(min = 1))]
    pub idle_timeout_s: u64,

    /// Background eviction interval (s)
    #[validate(range(min = 1))]
    pub eviction_interval_s: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            nominal_period_ms: 10.0,
            idle_timeout_s: 1800,
            eviction_interval_s: 60,
        }
    }
}
