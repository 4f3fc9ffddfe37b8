use crate::core::lossy::{LookupTable, MAX_PRECISION_DIGITS, MAX_TABLE_SIZE};
use crate::core::thresholds::ThresholdSet;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HealthStatus {
    Healthy,
    /// Channels whose thresholds are all equal.
    Degenerate(Vec<usize>),
    Suspicious(String),
}

pub struct Diagnostics;

impl Diagnostics {
    /// Checks a threshold set before tables are built from it.
    pub fn check(thresholds: &ThresholdSet, precision_digits: u32) -> HealthStatus {
        let degenerate: Vec<usize> = (0..thresholds.channels())
            .filter(|&c| {
                let (lo, hi) = thresholds.channel_bounds(c);
                lo == hi
            })
            .collect();
        if !degenerate.is_empty() {
            return HealthStatus::Degenerate(degenerate);
        }

        if precision_digits > MAX_PRECISION_DIGITS {
            return HealthStatus::Suspicious(format!(
                "Precision of {} digits exceeds {}",
                precision_digits, MAX_PRECISION_DIGITS
            ));
        }

        let scale = 10f64.powi(precision_digits as i32);
        for c in 0..thresholds.channels() {
            let (lo, hi) = thresholds.channel_bounds(c);
            let size = ((hi as f64 - lo as f64) * scale).ceil() as u64 + 1;
            if size > MAX_TABLE_SIZE {
                return HealthStatus::Suspicious(format!(
                    "Channel {} needs a table of {} entries at {} digits",
                    c, size, precision_digits
                ));
            }
            if let Err(err) = LookupTable::build(thresholds.channel(c), precision_digits) {
                return HealthStatus::Suspicious(format!("Channel {}: {}", c, err));
            }
        }

        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thresholds::tests::linear_row;

    #[test]
    fn test_check() {
        let healthy = ThresholdSet::broadcast(&linear_row(-1.0, 1.0), 2).unwrap();
        assert_eq!(Diagnostics::check(&healthy, 3), HealthStatus::Healthy);
        assert!(matches!(Diagnostics::check(&healthy, 9), HealthStatus::Suspicious(_)));

        let mut values = linear_row(-1.0, 1.0);
        values.extend([0.5; 255]);
        let degenerate = ThresholdSet::new(values, 2).unwrap();
        assert_eq!(Diagnostics::check(&degenerate, 3), HealthStatus::Degenerate(vec![1]));

        // Neighbours 0.0079 apart share slots at 1 digit.
        assert!(matches!(Diagnostics::check(&healthy, 1), HealthStatus::Suspicious(_)));

        let wide = ThresholdSet::broadcast(&linear_row(-1000.0, 1000.0), 1).unwrap();
        assert!(matches!(Diagnostics::check(&wide, 6), HealthStatus::Suspicious(_)));
    }
}
