//! Threshold storage
//!
//! A `ThresholdSet` holds `channels × 255` thresholds, channel after channel,
//! each channel sorted ascending. It is validated once on construction and is
//! immutable afterwards; clones share the same buffer.

use crate::error::{QuantError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of thresholds each channel carries.
pub const THRESHOLDS_PER_CHANNEL: usize = 255;

/// Highest rank a value can reach. The rank saturates here so codes stay
/// within `[-128, 126]`.
pub const MAX_RANK: usize = THRESHOLDS_PER_CHANNEL - 1;

/// Code for a rank: `-128 + min(rank, MAX_RANK)`.
#[inline(always)]
pub fn code_for_rank(rank: usize) -> i8 {
    (rank.min(MAX_RANK) as i32 - 128) as i8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct ThresholdSet {
    values: Arc<[f32]>,
    channels: usize,
}

#[derive(Serialize, Deserialize)]
struct RawThresholds {
    channels: usize,
    values: Vec<f32>,
}

impl TryFrom<RawThresholds> for ThresholdSet {
    type Error = QuantError;

    fn try_from(raw: RawThresholds) -> Result<Self> {
        ThresholdSet::new(raw.values, raw.channels)
    }
}

impl From<ThresholdSet> for RawThresholds {
    fn from(set: ThresholdSet) -> Self {
        RawThresholds {
            channels: set.channels,
            values: set.values.to_vec(),
        }
    }
}

impl ThresholdSet {
    pub fn new(values: Vec<f32>, channels: usize) -> Result<Self> {
        if channels == 0 {
            return Err(QuantError::ZeroChannels);
        }
        let expected = channels * THRESHOLDS_PER_CHANNEL;
        if values.len() != expected {
            return Err(QuantError::ThresholdCount {
                expected,
                actual: values.len(),
            });
        }

        for (channel, row) in values.chunks_exact(THRESHOLDS_PER_CHANNEL).enumerate() {
            if let Some(index) = row.iter().position(|t| !t.is_finite()) {
                return Err(QuantError::NonFiniteThreshold { channel, index });
            }
            if let Some(index) = row.windows(2).position(|w| w[1] < w[0]) {
                return Err(QuantError::UnsortedThresholds {
                    channel,
                    index: index + 1,
                });
            }
        }

        Ok(Self {
            values: values.into(),
            channels,
        })
    }

    /// Builds a set where every channel shares the same thresholds.
    pub fn broadcast(row: &[f32], channels: usize) -> Result<Self> {
        let mut values = Vec::with_capacity(row.len() * channels);
        for _ in 0..channels {
            values.extend_from_slice(row);
        }
        Self::new(values, channels)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Sorted thresholds of one channel.
    #[inline(always)]
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * THRESHOLDS_PER_CHANNEL;
        &self.values[start..start + THRESHOLDS_PER_CHANNEL]
    }

    /// Clones of one set compare by pointer, anything else by value.
    pub fn same_values(&self, other: &ThresholdSet) -> bool {
        Arc::ptr_eq(&self.values, &other.values) || self == other
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// `(first, last)` threshold of a channel.
    pub fn channel_bounds(&self, channel: usize) -> (f32, f32) {
        let row = self.channel(channel);
        (row[0], row[MAX_RANK])
    }

    /// Smallest threshold across all channels.
    pub fn min(&self) -> f32 {
        (0..self.channels)
            .map(|c| self.channel(c)[0])
            .fold(f32::INFINITY, f32::min)
    }

    /// Largest threshold across all channels.
    pub fn max(&self) -> f32 {
        (0..self.channels)
            .map(|c| self.channel(c)[MAX_RANK])
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Evenly spaced thresholds from `lo` to `hi` inclusive.
    pub(crate) fn linear_row(lo: f32, hi: f32) -> Vec<f32> {
        let step = (hi - lo) / MAX_RANK as f32;
        (0..THRESHOLDS_PER_CHANNEL)
            .map(|i| lo + step * i as f32)
            .collect()
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(
            ThresholdSet::new(vec![0.0; 10], 1),
            Err(QuantError::ThresholdCount { expected: 255, actual: 10 })
        ));
        assert!(matches!(
            ThresholdSet::new(Vec::new(), 0),
            Err(QuantError::ZeroChannels)
        ));
    }

    #[test]
    fn test_rejects_unsorted_and_nan() {
        let mut row = linear_row(-1.0, 1.0);
        row[40] = 5.0;
        assert!(matches!(
            ThresholdSet::new(row, 1),
            Err(QuantError::UnsortedThresholds { channel: 0, index: 41 })
        ));

        let mut values = linear_row(-1.0, 1.0);
        values.extend(linear_row(-1.0, 1.0));
        values[255 + 3] = f32::NAN;
        assert!(matches!(
            ThresholdSet::new(values, 2),
            Err(QuantError::NonFiniteThreshold { channel: 1, index: 3 })
        ));
    }

    #[test]
    fn test_bounds_and_channels() {
        let mut values = linear_row(-2.0, 1.0);
        values.extend(linear_row(-0.5, 3.0));
        let set = ThresholdSet::new(values, 2).unwrap();

        assert_eq!(set.channels(), 2);
        assert_eq!(set.channel(1).len(), THRESHOLDS_PER_CHANNEL);
        assert_eq!(set.channel_bounds(0).0, -2.0);
        assert_eq!(set.min(), -2.0);
        assert!((set.max() - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_json_revalidates() {
        let set = ThresholdSet::broadcast(&linear_row(0.0, 1.0), 3).unwrap();
        let json = set.to_json_string().unwrap();
        let back = ThresholdSet::from_json_str(&json).unwrap();
        assert_eq!(back, set);
        assert!(back.same_values(&set));
        assert!(!back.same_values(&ThresholdSet::broadcast(&linear_row(0.0, 2.0), 3).unwrap()));

        assert!(ThresholdSet::from_json_str(r#"{"channels":1,"values":[1.0,0.0]}"#).is_err());
    }

    #[test]
    fn test_code_for_rank_saturates() {
        assert_eq!(code_for_rank(0), -128);
        assert_eq!(code_for_rank(254), 126);
        assert_eq!(code_for_rank(255), 126);
    }
}
