//! Chunk temperature summary

use contracts::TemperatureReading;

/// Spacing of consecutive temperature readings (ms)
pub const TEMPERATURE_INTERVAL_MS: i64 = 1_000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureSummary {
    /// Mean of the chunk readings, `None` without readings
    pub avg_c: Option<f64>,
    pub timeline: Vec<TemperatureReading>,
}

/// Average and 1 Hz timeline of the chunk temperatures.
///
/// The timeline starts at `first_timestamp_ms`, or `fallback_timestamp_ms` (the
/// first mapped sample) when absent; with neither there is no timeline.
pub fn summarize(
    temps: &[f64],
    first_timestamp_ms: Option<i64>,
    fallback_timestamp_ms: Option<i64>,
) -> TemperatureSummary {
    if temps.is_empty() {
        return TemperatureSummary::default();
    }

    let avg_c = Some(temps.iter().sum::<f64>() / temps.len() as f64);
    let timeline = match first_timestamp_ms.or(fallback_timestamp_ms) {
        Some(start) => temps
            .iter()
            .enumerate()
            .map(|(i, &celsius)| TemperatureReading {
                timestamp_ms: start + i as i64 * TEMPERATURE_INTERVAL_MS,
                celsius,
            })
            .collect(),
        None => Vec::new(),
    };

    TemperatureSummary { avg_c, timeline }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_readings() {
        let summary = summarize(&[], Some(1_000), None);
        assert_eq!(summary, TemperatureSummary::default());
    }

    #[test]
    fn test_average_and_explicit_start() {
        let summary = summarize(&[38.0, 38.5, 39.0], Some(10_000), Some(1));
        assert_eq!(summary.avg_c, Some(38.5));
        let stamps: Vec<_> = summary.timeline.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![10_000, 11_000, 12_000]);
    }

    #[test]
    fn test_fallback_start_and_no_start() {
        let summary = summarize(&[37.0], None, Some(555));
        assert_eq!(summary.timeline[0].timestamp_ms, 555);

        let summary = summarize(&[37.0, 37.2], None, None);
        assert!(summary.avg_c.is_some());
        assert!(summary.timeline.is_empty());
    }
}
