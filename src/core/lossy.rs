//! Lossy lookup-table thresholding
//!
//! A channel's staircase is sampled onto a dense table indexed by
//! `floor(value * 10^digits + shift)`. Building happens once (ahead of time
//! via [`LossyThresholdLookup::build`] or on first use via [`LazyLookup`]);
//! afterwards the table is read-only and shared freely across threads.
//!
//! Table entries hold the code of the highest threshold rank whose slot is at
//! or below the entry. Every threshold must own its slot (a build that would
//! share one is rejected), so slot 0 always holds rank 0 and lookups are off
//! by at most one code step from the exact quantizer. The only exception is a
//! channel whose thresholds are all equal: its table is a single entry.

use crate::core::batch::{Batch, Codes, Layout};
use crate::core::thresholds::{code_for_rank, ThresholdSet, THRESHOLDS_PER_CHANNEL};
use crate::core::{check_channels, Quantizer};
use crate::error::{QuantError, Result};
use crate::simd::{scalar, IndexKernel, IndexParams, LANES};
use rayon::prelude::*;
use std::sync::OnceLock;
use tracing::{info, warn};

pub const MAX_PRECISION_DIGITS: u32 = 7;

/// Indices stay exactly representable as `f32`.
pub const MAX_TABLE_SIZE: u64 = 1 << 24;

/// Values per parallel task; a multiple of `LANES`.
const CHUNK: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    codes: Vec<i8>,
    params: IndexParams,
    collisions: usize,
}

impl LookupTable {
    /// Builds the table for one channel's sorted thresholds.
    pub fn build(thresholds: &[f32], precision_digits: u32) -> Result<Self> {
        validate_row(thresholds)?;
        if precision_digits > MAX_PRECISION_DIGITS {
            return Err(QuantError::InvalidPrecision {
                digits: precision_digits,
                max: MAX_PRECISION_DIGITS,
            });
        }

        let min = thresholds[0];
        let max = thresholds[thresholds.len() - 1];
        let scale = 10f32.powi(precision_digits as i32);
        let shift = -(min * scale);

        let size = ((max as f64 - min as f64) * scale as f64).ceil() as u64 + 1;
        if size > MAX_TABLE_SIZE {
            return Err(QuantError::TableTooLarge {
                size,
                max: MAX_TABLE_SIZE,
            });
        }

        let params = IndexParams {
            scale,
            shift,
            last: (size - 1) as u32,
        };

        // Sparse pass: each threshold claims its slot, later (higher) ranks win.
        let mut slots: Vec<Option<u8>> = vec![None; size as usize];
        let mut collisions = 0;
        for (rank, &t) in thresholds.iter().enumerate() {
            let slot = &mut slots[scalar::lookup_index(&params, t)];
            if slot.is_some() {
                collisions += 1;
            }
            *slot = Some(rank as u8);
        }
        if collisions > 0 && min != max {
            return Err(QuantError::PrecisionTooLow {
                digits: precision_digits,
                collisions,
            });
        }

        // Forward fill: unclaimed slots repeat the last claimed rank.
        let mut current = 0u8;
        let codes = slots
            .into_iter()
            .map(|slot| {
                if let Some(rank) = slot {
                    current = rank;
                }
                code_for_rank(current as usize)
            })
            .collect();

        Ok(Self {
            codes,
            params,
            collisions,
        })
    }

    pub fn codes(&self) -> &[i8] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    pub fn scale(&self) -> f32 {
        self.params.scale
    }

    pub fn shift(&self) -> f32 {
        self.params.shift
    }

    /// Thresholds that landed on an already claimed slot. Non-zero only for a
    /// degenerate channel.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    #[inline(always)]
    pub fn index_of(&self, value: f32) -> usize {
        scalar::lookup_index(&self.params, value)
    }

    #[inline(always)]
    pub fn first(&self) -> i8 {
        self.codes[0]
    }

    #[inline(always)]
    pub fn last(&self) -> i8 {
        self.codes[self.codes.len() - 1]
    }
}

fn validate_row(thresholds: &[f32]) -> Result<()> {
    if thresholds.is_empty() || thresholds.len() > THRESHOLDS_PER_CHANNEL {
        return Err(QuantError::ThresholdCount {
            expected: THRESHOLDS_PER_CHANNEL,
            actual: thresholds.len(),
        });
    }
    if let Some(index) = thresholds.iter().position(|t| !t.is_finite()) {
        return Err(QuantError::NonFiniteThreshold { channel: 0, index });
    }
    if let Some(index) = thresholds.windows(2).position(|w| w[1] < w[0]) {
        return Err(QuantError::UnsortedThresholds {
            channel: 0,
            index: index + 1,
        });
    }
    Ok(())
}

/// A built table plus the threshold bounds used to clamp out-of-range input.
#[derive(Debug, Clone, PartialEq)]
pub struct LossyThresholdLookup {
    table: LookupTable,
    min: f32,
    max: f32,
}

impl LossyThresholdLookup {
    pub fn build(thresholds: &[f32], precision_digits: u32) -> Result<Self> {
        let table = LookupTable::build(thresholds, precision_digits)?;
        let min = thresholds[0];
        let max = thresholds[thresholds.len() - 1];

        if min == max {
            warn!(code = table.first(), "degenerate threshold range, table has one entry");
        }
        info!(entries = table.len(), min, max, precision_digits, "lookup table built");

        Ok(Self { table, min, max })
    }

    pub fn table(&self) -> &LookupTable {
        &self.table
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn scale(&self) -> f32 {
        self.table.scale()
    }

    pub fn shift(&self) -> f32 {
        self.table.shift()
    }

    pub fn collisions(&self) -> usize {
        self.table.collisions()
    }

    /// Code for a single value. Out-of-range values clamp to the extreme
    /// entries; NaN reads the first entry.
    #[inline]
    pub fn threshold(&self, value: f32) -> i8 {
        if value > self.max {
            self.table.last()
        } else if value < self.min {
            self.table.first()
        } else {
            self.table.codes[self.table.index_of(value)]
        }
    }

    /// Scalar lookup of every input, spread over the rayon pool.
    pub fn evaluate(&self, inputs: &[f32]) -> Vec<i8> {
        inputs
            .par_iter()
            .with_min_len(CHUNK)
            .map(|&v| self.threshold(v))
            .collect()
    }

    pub fn evaluate_into(&self, inputs: &[f32], out: &mut [i8]) -> Result<()> {
        if out.len() != inputs.len() {
            return Err(QuantError::OutputLength {
                expected: inputs.len(),
                actual: out.len(),
            });
        }
        out.par_iter_mut()
            .with_min_len(CHUNK)
            .zip(inputs.par_iter())
            .for_each(|(o, &v)| *o = self.threshold(v));
        Ok(())
    }

    /// 8-wide lookup with the best kernel this CPU supports.
    ///
    /// The length must be a multiple of 8 on every machine, whichever kernel
    /// ends up running.
    pub fn evaluate_vectorized(&self, inputs: &[f32]) -> Result<Vec<i8>> {
        if inputs.len() % LANES != 0 {
            return Err(QuantError::UnsupportedVectorWidth {
                len: inputs.len(),
                width: LANES,
            });
        }
        self.evaluate_with(IndexKernel::detect(), inputs)
    }

    /// Lookup with an explicit index kernel. Indices are clamped to the
    /// table, which gives the same codes as the bound checks in `threshold`.
    pub fn evaluate_with(&self, kernel: IndexKernel, inputs: &[f32]) -> Result<Vec<i8>> {
        let width = kernel.lanes();
        if inputs.len() % width != 0 {
            return Err(QuantError::UnsupportedVectorWidth {
                len: inputs.len(),
                width,
            });
        }

        let codes = &self.table.codes;
        let params = &self.table.params;
        let mut out = vec![0i8; inputs.len()];
        out.par_chunks_mut(CHUNK)
            .zip(inputs.par_chunks(CHUNK))
            .for_each(|(out, inputs)| {
                let mut idx = [0u32; CHUNK];
                kernel.fill_indices(params, inputs, &mut idx);
                for (o, &i) in out.iter_mut().zip(&idx[..inputs.len()]) {
                    *o = codes[i as usize];
                }
            });
        Ok(out)
    }
}

/// Lookup built on first use with the same algorithm as the eager build.
pub struct LazyLookup {
    thresholds: Vec<f32>,
    precision_digits: u32,
    built: OnceLock<LossyThresholdLookup>,
}

impl LazyLookup {
    pub fn new(thresholds: Vec<f32>, precision_digits: u32) -> Self {
        Self {
            thresholds,
            precision_digits,
            built: OnceLock::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        self.built.get().is_some()
    }

    pub fn get(&self) -> Result<&LossyThresholdLookup> {
        if let Some(lookup) = self.built.get() {
            return Ok(lookup);
        }
        // Concurrent first calls may both build; the results are identical.
        let lookup = LossyThresholdLookup::build(&self.thresholds, self.precision_digits)?;
        Ok(self.built.get_or_init(|| lookup))
    }

    pub fn threshold(&self, value: f32) -> Result<i8> {
        Ok(self.get()?.threshold(value))
    }
}

/// One lookup table per channel behind the common `Quantizer` contract.
///
/// Tables are tied to the set they were built from; quantizing against any
/// other set fails with `TableMismatch`.
pub struct LossyQuantizer {
    thresholds: ThresholdSet,
    lookups: Vec<LossyThresholdLookup>,
    precision_digits: u32,
}

impl LossyQuantizer {
    pub fn build(thresholds: &ThresholdSet, precision_digits: u32) -> Result<Self> {
        let lookups = (0..thresholds.channels())
            .into_par_iter()
            .map(|c| LossyThresholdLookup::build(thresholds.channel(c), precision_digits))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            thresholds: thresholds.clone(),
            lookups,
            precision_digits,
        })
    }

    pub fn precision_digits(&self) -> u32 {
        self.precision_digits
    }

    pub fn lookup(&self, channel: usize) -> &LossyThresholdLookup {
        &self.lookups[channel]
    }

    pub fn table_bytes(&self) -> usize {
        self.lookups.iter().map(|l| l.table().len()).sum()
    }
}

impl Quantizer for LossyQuantizer {
    fn name(&self) -> &'static str {
        "lossy-table"
    }

    fn quantize(&self, thresholds: &ThresholdSet, batch: &Batch<'_>) -> Result<Codes> {
        check_channels(thresholds, batch)?;
        if !self.thresholds.same_values(thresholds) {
            return Err(QuantError::TableMismatch);
        }

        let channels = batch.channels();
        let mut out = vec![0i8; batch.len()];
        if out.is_empty() {
            return Ok(Codes::from_parts(out, channels, batch.layout()));
        }

        match batch.layout() {
            Layout::BatchMajor => {
                out.par_chunks_mut(channels)
                    .zip(batch.data().par_chunks(channels))
                    .for_each(|(codes, values)| {
                        for ((code, &v), lookup) in codes.iter_mut().zip(values).zip(&self.lookups) {
                            *code = lookup.threshold(v);
                        }
                    });
            }
            Layout::ChannelMajor => {
                let samples = batch.samples();
                out.par_chunks_mut(samples)
                    .zip(batch.data().par_chunks(samples))
                    .zip(self.lookups.par_iter())
                    .for_each(|((codes, values), lookup)| {
                        for (code, &v) in codes.iter_mut().zip(values) {
                            *code = lookup.threshold(v);
                        }
                    });
            }
        }

        Ok(Codes::from_parts(out, channels, batch.layout()))
    }
}
