//! Exact multi-threshold kernels
//!
//! Every strategy computes `code = -128 + #{ t in channel : t < value }`
//! (rank saturated at 254) and produces bit-identical output; they differ
//! only in search algorithm and iteration order.

use crate::core::batch::{Batch, Codes, Layout};
use crate::core::runtime::{PoolConfig, WorkerPool};
use crate::core::thresholds::{code_for_rank, ThresholdSet};
use crate::core::{check_channels, Quantizer};
use crate::error::Result;
use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Linear scan: counts thresholds strictly below `value`.
#[inline]
pub fn reference_rank(row: &[f32], value: f32) -> usize {
    let mut rank = 0;
    for &t in row {
        rank += (t < value) as usize;
    }
    rank
}

/// Binary search for the first threshold not below `value`.
#[inline]
pub fn binary_rank(row: &[f32], value: f32) -> usize {
    row.partition_point(|&t| t < value)
}

/// Per-channel search state for consecutive samples of one channel.
///
/// Remembers the last value and its rank so the next search only covers
/// the part of the row on the correct side of it.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTracker {
    last: f32,
    rank: usize,
}

impl Default for MonotonicTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicTracker {
    pub fn new() -> Self {
        // Nothing is below -inf, so rank 0 is consistent with it.
        Self {
            last: f32::NEG_INFINITY,
            rank: 0,
        }
    }

    #[inline]
    pub fn rank(&mut self, row: &[f32], value: f32) -> usize {
        let rank = match value.partial_cmp(&self.last) {
            Some(Ordering::Equal) => self.rank,
            // row[..self.rank] is entirely below `last`, hence below `value`.
            Some(Ordering::Greater) => self.rank + binary_rank(&row[self.rank..], value),
            // row[self.rank..] is at or above `last`, hence above `value`.
            Some(Ordering::Less) => binary_rank(&row[..self.rank], value),
            // NaN on either side.
            None => binary_rank(row, value),
        };
        self.last = value;
        self.rank = rank;
        rank
    }
}

/// Which loop is outermost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOrder {
    /// Samples outer, channels inner. Cache-friendly for few channels.
    BatchMajor,
    /// Channels outer, samples inner.
    ChannelMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Linear scan over all 255 thresholds. Ground truth.
    Reference,
    /// Binary search per element.
    BinarySearch(IterationOrder),
    /// Channel-major binary search narrowed by the previous sample.
    Monotonic,
    /// `Monotonic`, with channels split across the worker pool.
    Parallel,
}

pub struct ExactQuantizer {
    strategy: Strategy,
    pool: Option<Arc<WorkerPool>>,
}

impl ExactQuantizer {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            pool: None,
        }
    }

    /// Channel-parallel quantizer on a caller-owned pool.
    pub fn parallel(pool: Arc<WorkerPool>) -> Self {
        Self {
            strategy: Strategy::Parallel,
            pool: Some(pool),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    fn pool(&self) -> Result<Arc<WorkerPool>> {
        match &self.pool {
            Some(pool) => Ok(pool.clone()),
            None => shared_pool(),
        }
    }
}

fn shared_pool() -> Result<Arc<WorkerPool>> {
    static POOL: OnceLock<Arc<WorkerPool>> = OnceLock::new();
    if let Some(pool) = POOL.get() {
        return Ok(pool.clone());
    }
    let pool = Arc::new(WorkerPool::new(PoolConfig::default())?);
    Ok(POOL.get_or_init(|| pool).clone())
}

impl Quantizer for ExactQuantizer {
    fn name(&self) -> &'static str {
        match self.strategy {
            Strategy::Reference => "reference",
            Strategy::BinarySearch(IterationOrder::BatchMajor) => "binary-search/batch-major",
            Strategy::BinarySearch(IterationOrder::ChannelMajor) => "binary-search/channel-major",
            Strategy::Monotonic => "monotonic",
            Strategy::Parallel => "monotonic/parallel",
        }
    }

    fn quantize(&self, thresholds: &ThresholdSet, batch: &Batch<'_>) -> Result<Codes> {
        check_channels(thresholds, batch)?;
        let channels = batch.channels();

        let codes = match self.strategy {
            Strategy::Reference => {
                let samples = batch.samples();
                let mut out = Vec::with_capacity(batch.len());
                for (i, &value) in batch.data().iter().enumerate() {
                    let channel = match batch.layout() {
                        Layout::BatchMajor => i % channels,
                        Layout::ChannelMajor => i / samples,
                    };
                    out.push(code_for_rank(reference_rank(thresholds.channel(channel), value)));
                }
                Codes::from_parts(out, channels, batch.layout())
            }
            Strategy::BinarySearch(order) => binary_search(thresholds, batch, order),
            Strategy::Monotonic => {
                let samples = batch.samples();
                let mut out = vec![0i8; batch.len()];
                if samples > 0 {
                    for (channel, row) in out.chunks_mut(samples).enumerate() {
                        scan_channel(thresholds.channel(channel), batch, channel, row);
                    }
                }
                Codes::from_parts(out, channels, Layout::ChannelMajor).into_layout(batch.layout())
            }
            Strategy::Parallel => {
                let pool = self.pool()?;
                let samples = batch.samples();
                let mut out = vec![0i8; batch.len()];
                pool.for_each_channel(&mut out, samples, |channel, row| {
                    scan_channel(thresholds.channel(channel), batch, channel, row);
                });
                Codes::from_parts(out, channels, Layout::ChannelMajor).into_layout(batch.layout())
            }
        };

        debug!(quantizer = self.name(), values = batch.len(), "quantized batch");
        Ok(codes)
    }
}

fn binary_search(thresholds: &ThresholdSet, batch: &Batch<'_>, order: IterationOrder) -> Codes {
    let samples = batch.samples();
    let channels = batch.channels();
    let layout = batch.layout();
    let mut out = vec![0i8; batch.len()];

    let mut visit = |sample: usize, channel: usize| {
        let rank = binary_rank(thresholds.channel(channel), batch.value(sample, channel));
        out[layout.offset(sample, channel, samples, channels)] = code_for_rank(rank);
    };

    match order {
        IterationOrder::BatchMajor => {
            for sample in 0..samples {
                for channel in 0..channels {
                    visit(sample, channel);
                }
            }
        }
        IterationOrder::ChannelMajor => {
            for channel in 0..channels {
                for sample in 0..samples {
                    visit(sample, channel);
                }
            }
        }
    }

    Codes::from_parts(out, channels, layout)
}

/// Fills one channel's row of codes in sample order.
fn scan_channel(row: &[f32], batch: &Batch<'_>, channel: usize, out: &mut [i8]) {
    if out.len() == 1 {
        out[0] = code_for_rank(binary_rank(row, batch.value(0, channel)));
        return;
    }
    let mut tracker = MonotonicTracker::new();
    for (sample, slot) in out.iter_mut().enumerate() {
        *slot = code_for_rank(tracker.rank(row, batch.value(sample, channel)));
    }
}
