//! Per-tensor affine quantizer
//!
//! Replaces every channel's staircase with one global linear estimate
//! `round((value - min) * 254 / (max - min))`, where `min`/`max` are the
//! extreme thresholds of the whole tensor, then nudges the estimate up by one
//! when the channel's threshold at that rank is still below the value.
//!
//! This is exact when every channel shares evenly spaced thresholds. For
//! anything else it is an approximation; [`PerTensorAffine::deviation`]
//! measures how far it strays from the exact quantizer.

use crate::core::batch::{Batch, Codes, Layout};
use crate::core::exact::{ExactQuantizer, Strategy};
use crate::core::thresholds::{code_for_rank, ThresholdSet, MAX_RANK};
use crate::core::{check_channels, Quantizer};
use crate::error::Result;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerTensorAffine {
    min: f32,
    max: f32,
    scale: f32,
}

/// How an approximate quantizer compares with the exact one on a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviationReport {
    pub total: usize,
    pub mismatches: usize,
    /// Largest absolute difference in code steps.
    pub max_step: u8,
}

impl DeviationReport {
    pub fn mismatch_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.mismatches as f64 / self.total as f64
        }
    }

    pub fn compare(approx: &[i8], exact: &[i8]) -> Self {
        let mut report = Self {
            total: exact.len(),
            ..Self::default()
        };
        for (&a, &e) in approx.iter().zip(exact) {
            let step = (a as i16 - e as i16).unsigned_abs() as u8;
            if step > 0 {
                report.mismatches += 1;
                report.max_step = report.max_step.max(step);
            }
        }
        report
    }
}

impl PerTensorAffine {
    pub fn new(thresholds: &ThresholdSet) -> Self {
        let min = thresholds.min();
        let max = thresholds.max();
        let scale = if max > min {
            MAX_RANK as f32 / (max - min)
        } else {
            0.0
        };
        Self { min, max, scale }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Global rank estimate, clamped to `[0, 254]` before the cast.
    #[inline(always)]
    pub fn estimate(&self, value: f32) -> usize {
        let pos = ((value - self.min) * self.scale).round();
        pos.max(0.0).min(MAX_RANK as f32) as usize
    }

    #[inline(always)]
    pub fn code(&self, row: &[f32], value: f32) -> i8 {
        // Zero range: one step, crossed only by values above it.
        if self.scale == 0.0 {
            return code_for_rank(if value > self.max { MAX_RANK } else { 0 });
        }
        let mut rank = self.estimate(value);
        if rank < MAX_RANK && row[rank] < value {
            rank += 1;
        }
        code_for_rank(rank)
    }

    /// Quantizes `batch` with the approximation and with the exact kernel and
    /// reports the difference.
    pub fn deviation(&self, thresholds: &ThresholdSet, batch: &Batch<'_>) -> Result<DeviationReport> {
        let approx = self.quantize(thresholds, batch)?;
        let exact = ExactQuantizer::new(Strategy::Monotonic).quantize(thresholds, batch)?;
        Ok(DeviationReport::compare(approx.as_slice(), exact.as_slice()))
    }
}

impl Quantizer for PerTensorAffine {
    fn name(&self) -> &'static str {
        "per-tensor-affine"
    }

    fn quantize(&self, thresholds: &ThresholdSet, batch: &Batch<'_>) -> Result<Codes> {
        check_channels(thresholds, batch)?;
        let channels = batch.channels();
        let mut out = vec![0i8; batch.len()];
        if out.is_empty() {
            return Ok(Codes::from_parts(out, channels, batch.layout()));
        }

        match batch.layout() {
            Layout::BatchMajor => {
                out.par_chunks_mut(channels)
                    .zip(batch.data().par_chunks(channels))
                    .with_min_len(256)
                    .for_each(|(codes, values)| {
                        for (c, (code, &v)) in codes.iter_mut().zip(values).enumerate() {
                            *code = self.code(thresholds.channel(c), v);
                        }
                    });
            }
            Layout::ChannelMajor => {
                let samples = batch.samples();
                out.par_chunks_mut(samples)
                    .zip(batch.data().par_chunks(samples))
                    .enumerate()
                    .for_each(|(c, (codes, values))| {
                        let row = thresholds.channel(c);
                        for (code, &v) in codes.iter_mut().zip(values) {
                            *code = self.code(row, v);
                        }
                    });
            }
        }

        Ok(Codes::from_parts(out, channels, batch.layout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{irregular_thresholds, random_inputs};
    use crate::core::thresholds::tests::linear_row;

    #[test]
    fn test_exact_on_shared_uniform_thresholds() {
        let thresholds = ThresholdSet::broadcast(&linear_row(-2.0, 2.0), 8).unwrap();
        let affine = PerTensorAffine::new(&thresholds);
        assert_eq!(affine.min(), -2.0);

        let mut inputs = random_inputs(8 * 512, 11);
        inputs.extend([f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -2.0, 2.0, 0.0, 10.0, -10.0]);
        let batch = Batch::batch_major(&inputs, 8).unwrap();

        let report = affine.deviation(&thresholds, &batch).unwrap();
        assert_eq!(report.total, inputs.len());
        assert_eq!(report.mismatches, 0, "{:?}", report);
        assert_eq!(report.mismatch_rate(), 0.0);
    }

    #[test]
    fn test_extremes_clamp() {
        let thresholds = ThresholdSet::broadcast(&linear_row(-1.0, 1.0), 1).unwrap();
        let affine = PerTensorAffine::new(&thresholds);
        let row = thresholds.channel(0);
        assert_eq!(affine.code(row, -50.0), -128);
        assert_eq!(affine.code(row, 50.0), 126);
        assert_eq!(affine.code(row, f32::NAN), -128);
    }

    #[test]
    fn test_deviation_is_reported_for_irregular_thresholds() {
        let thresholds = irregular_thresholds(4, 21);
        let affine = PerTensorAffine::new(&thresholds);
        let inputs = random_inputs(4 * 256, 22);
        let batch = Batch::batch_major(&inputs, 4).unwrap();

        let approx = affine.quantize(&thresholds, &batch).unwrap();
        let exact = ExactQuantizer::new(Strategy::Reference)
            .quantize(&thresholds, &batch)
            .unwrap();
        let report = affine.deviation(&thresholds, &batch).unwrap();
        assert_eq!(report, DeviationReport::compare(approx.as_slice(), exact.as_slice()));
        assert!(report.mismatches <= report.total);
        assert!(approx.as_slice().iter().all(|&c| c <= 126));
    }

    #[test]
    fn test_layout_independent() {
        let thresholds = irregular_thresholds(3, 2);
        let affine = PerTensorAffine::new(&thresholds);
        let inputs = random_inputs(3 * 50, 3);
        let bm = Batch::batch_major(&inputs, 3).unwrap();
        let cm_data = bm.to_layout(Layout::ChannelMajor);
        let cm = Batch::channel_major(&cm_data, 3).unwrap();

        let a = affine.quantize(&thresholds, &bm).unwrap();
        let b = affine.quantize(&thresholds, &cm).unwrap();
        assert_eq!(b.into_layout(Layout::BatchMajor), a);
    }

    #[test]
    fn test_degenerate_tensor() {
        let thresholds = ThresholdSet::broadcast(&[0.25; 255], 2).unwrap();
        let affine = PerTensorAffine::new(&thresholds);
        assert_eq!(affine.scale(), 0.0);
        let row = thresholds.channel(0);
        assert_eq!(affine.code(row, 0.0), -128);
        assert_eq!(affine.code(row, 0.25), -128);
        assert_eq!(affine.code(row, 1.0), 126);
        assert_eq!(affine.code(row, 100.0), 126);
        assert_eq!(affine.code(row, f32::INFINITY), 126);
        assert_eq!(affine.code(row, f32::NEG_INFINITY), -128);
        assert_eq!(affine.code(row, f32::NAN), -128);

        let inputs = [0.0, 0.25, 1.0, 100.0, -3.0, 0.2500001, f32::NAN, 7.0];
        let batch = Batch::batch_major(&inputs, 2).unwrap();
        let report = affine.deviation(&thresholds, &batch).unwrap();
        assert_eq!(report.mismatches, 0, "{:?}", report);
    }
}
