//! Range-bucketed accept/reject counters.
//!
//! A point "accepted" by the grid is foreground, i.e. passed on to the
//! tracker; a rejected point was classified as background.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default bucket upper boundaries in meters.
pub const DEFAULT_BUCKET_METERS: [f64; 11] = [
    1.0, 20.0, 40.0, 60.0, 80.0, 100.0, 120.0, 140.0, 160.0, 180.0, 200.0,
];

/// Default bucket boundaries formatted as strings ("1", "20", ..., "200").
pub fn default_buckets() -> Vec<String> {
    DEFAULT_BUCKET_METERS.iter().map(|b| b.to_string()).collect()
}

/// Accepted/rejected counts per range bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceMetrics {
    /// Ascending upper boundaries.
    pub bucket_meters: Vec<f64>,
    pub accepted: Vec<u64>,
    pub rejected: Vec<u64>,
}

impl Default for AcceptanceMetrics {
    fn default() -> Self {
        Self::with_buckets(DEFAULT_BUCKET_METERS.to_vec())
    }
}

impl AcceptanceMetrics {
    fn with_buckets(bucket_meters: Vec<f64>) -> Self {
        let n = bucket_meters.len();
        Self {
            bucket_meters,
            accepted: vec![0; n],
            rejected: vec![0; n],
        }
    }

    /// Build empty counters for custom boundaries.
    ///
    /// Boundaries must be non-empty, finite, positive and strictly increasing.
    pub fn new(bucket_meters: Vec<f64>) -> Result<Self> {
        if bucket_meters.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one acceptance bucket is required".to_string(),
            ));
        }
        if bucket_meters.iter().any(|b| !b.is_finite() || *b <= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "bucket boundaries must be positive and finite: {:?}",
                bucket_meters
            )));
        }
        if bucket_meters.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidConfiguration(format!(
                "bucket boundaries must be strictly increasing: {:?}",
                bucket_meters
            )));
        }
        Ok(Self::with_buckets(bucket_meters))
    }

    /// Index of the first bucket whose boundary is >= `range_m`; ranges past
    /// the last boundary land in the last bucket.
    pub fn bucket_index(&self, range_m: f64) -> usize {
        let last = self.bucket_meters.len().saturating_sub(1);
        self.bucket_meters
            .iter()
            .position(|&b| range_m <= b)
            .unwrap_or(last)
    }

    pub fn record(&mut self, range_m: f64, accepted: bool) {
        if self.bucket_meters.is_empty() {
            return;
        }
        let idx = self.bucket_index(range_m);
        if accepted {
            self.accepted[idx] += 1;
        } else {
            self.rejected[idx] += 1;
        }
    }

    /// Fraction accepted per bucket (0 for empty buckets).
    pub fn acceptance_rates(&self) -> Vec<f64> {
        self.accepted
            .iter()
            .zip(&self.rejected)
            .map(|(&a, &r)| {
                let total = a + r;
                if total == 0 {
                    0.0
                } else {
                    a as f64 / total as f64
                }
            })
            .collect()
    }

    pub fn total_accepted(&self) -> u64 {
        self.accepted.iter().sum()
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.iter().sum()
    }

    /// Zero all counters, keeping the boundaries.
    pub fn clear(&mut self) {
        self.accepted.iter_mut().for_each(|c| *c = 0);
        self.rejected.iter_mut().for_each(|c| *c = 0);
    }
}
