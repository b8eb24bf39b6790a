use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const WINDOW_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntensityReading {
    pub value: u8,
    pub observed_at: DateTime<Utc>,
}

/// Most recent intensity readings, oldest first, evicting FIFO at capacity.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    readings: VecDeque<IntensityReading>,
    capacity: usize,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }
}

impl RollingWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: u8, observed_at: DateTime<Utc>) {
        self.readings.push_back(IntensityReading { value, observed_at });
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    pub fn readings(&self) -> impl Iterator<Item = &IntensityReading> {
        self.readings.iter()
    }

    pub fn values(&self) -> Vec<u8> {
        self.readings.iter().map(|reading| reading.value).collect()
    }

    pub fn max(&self) -> u8 {
        self.readings
            .iter()
            .map(|reading| reading.value)
            .max()
            .unwrap_or(0)
    }

    /// Arithmetic mean, or 0 for an empty window.
    pub fn mean(&self) -> f64 {
        if self.readings.is_empty() {
            return 0.0;
        }
        let total: u32 = self.readings.iter().map(|r| u32::from(r.value)).sum();
        f64::from(total) / self.readings.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn keeps_last_twenty_in_arrival_order() {
        let start = Utc::now();
        let mut window = RollingWindow::default();
        for i in 0..25u8 {
            window.push(i % 11, start + Duration::seconds(i64::from(i)));
            assert!(window.len() <= WINDOW_CAPACITY);
        }

        assert_eq!(window.len(), 20);
        let expected: Vec<u8> = (5..25u8).map(|i| i % 11).collect();
        assert_eq!(window.values(), expected);

        let stamps: Vec<_> = window.readings().map(|r| r.observed_at).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(stamps[0], start + Duration::seconds(5));
    }

    #[test]
    fn empty_window_statistics_are_zero() {
        let window = RollingWindow::default();
        assert_eq!(window.max(), 0);
        assert_eq!(window.mean(), 0.0);
    }

    #[test]
    fn statistics_over_values() {
        let mut window = RollingWindow::default();
        let now = Utc::now();
        for value in [2, 4, 9, 5] {
            window.push(value, now);
        }
        assert_eq!(window.max(), 9);
        assert_eq!(window.mean(), 5.0);

        window.clear();
        assert!(window.is_empty());
    }
}
