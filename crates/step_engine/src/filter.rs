//! Moving-average magnitude filter.

use std::fmt;

use ringbuf::{traits::*, HeapRb};

/// Fixed-length moving average
///
/// Averages over the filled part of the window until it is full.
pub struct MovingAverage {
    window: HeapRb<f64>,
    /// Sum of the buffered values
    sum: f64,
    capacity: usize,
}

impl MovingAverage {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: HeapRb::new(capacity),
            sum: 0.0,
            capacity,
        }
    }

    /// Push a value and return the current average
    #[inline]
    pub fn push(&mut self, value: f64) -> f64 {
        if let Some(evicted) = self.window.push_overwrite(value) {
            self.sum -= evicted;
        }
        self.sum += value;
        self.average()
    }

    /// Running sum over the fill count (0.0 when empty)
    #[inline]
    pub fn average(&self) -> f64 {
        let len = self.window.occupied_len();
        if len == 0 {
            return 0.0;
        }
        self.sum / len as f64
    }

    pub fn len(&self) -> usize {
        self.window.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Clone for MovingAverage {
    fn clone(&self) -> Self {
        let mut copy = Self::new(self.capacity);
        for value in self.window.iter() {
            copy.window.push_overwrite(*value);
        }
        copy.sum = self.sum;
        copy
    }
}

impl fmt::Debug for MovingAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MovingAverage")
            .field("len", &self.window.occupied_len())
            .field("capacity", &self.capacity)
            .field("average", &self.average())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_fill_averages_filled_part() {
        let mut ma = MovingAverage::new(4);
        assert_eq!(ma.push(2.0), 2.0);
        assert_eq!(ma.push(4.0), 3.0);
        assert_eq!(ma.len(), 2);
    }

    #[test]
    fn test_window_slides() {
        let mut ma = MovingAverage::new(3);
        for v in [1.0, 2.0, 3.0] {
            ma.push(v);
        }
        assert!((ma.push(10.0) - 5.0).abs() < 1e-12);
        assert_eq!(ma.len(), 3);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut ma = MovingAverage::new(2);
        ma.push(1.0);
        ma.push(3.0);

        let mut copy = ma.clone();
        assert_eq!(copy.average(), 2.0);
        copy.push(7.0);
        assert_eq!(copy.average(), 5.0);
        assert_eq!(ma.average(), 2.0);
    }

    #[test]
    fn test_running_sum_tracks_window() {
        let mut ma = MovingAverage::new(5);
        let values: Vec<f64> = (0..200).map(|i| ((i * 37) % 11) as f64 * 0.75).collect();
        for (i, &v) in values.iter().enumerate() {
            let avg = ma.push(v);
            let start = (i + 1).saturating_sub(5);
            let window = &values[start..=i];
            let expected = window.iter().sum::<f64>() / window.len() as f64;
            assert!((avg - expected).abs() < 1e-9, "sample {i}: {avg} vs {expected}");
        }
    }

    #[test]
    fn test_clone_continues_identically() {
        let mut ma = MovingAverage::new(3);
        for v in [2.5, 9.0, 4.25, 7.0] {
            ma.push(v);
        }
        let mut copy = ma.clone();
        for v in [1.0, 13.5, 6.0] {
            assert_eq!(ma.push(v).to_bits(), copy.push(v).to_bits());
        }
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut ma = MovingAverage::new(0);
        assert_eq!(ma.capacity(), 1);
        assert_eq!(ma.push(5.0), 5.0);
        assert_eq!(ma.push(6.0), 6.0);
    }
}
