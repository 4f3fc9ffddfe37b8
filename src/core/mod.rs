pub mod affine;
pub mod batch;
pub mod diagnostics;
pub mod exact;
pub mod hardware;
pub mod lossy;
pub mod runtime;
pub mod thresholds;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::core::batch::{Batch, Codes};
use crate::core::thresholds::ThresholdSet;
use crate::error::{QuantError, Result};

/// A batch quantizer. Exact, affine and table-based variants all share this
/// contract so callers (and tests) can swap them freely.
pub trait Quantizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quantizes every value of `batch`. The output has the same length and
    /// layout as the input. Shape errors are reported before any work.
    fn quantize(&self, thresholds: &ThresholdSet, batch: &Batch<'_>) -> Result<Codes>;
}

/// Quantizes a batch-major buffer with the channel-parallel exact kernel.
pub fn quantize(thresholds: &ThresholdSet, inputs: &[f32], channels: usize) -> Result<Vec<i8>> {
    let batch = Batch::batch_major(inputs, channels)?;
    let codes = exact::ExactQuantizer::new(exact::Strategy::Parallel).quantize(thresholds, &batch)?;
    Ok(codes.into_vec())
}

pub(crate) fn check_channels(thresholds: &ThresholdSet, batch: &Batch<'_>) -> Result<()> {
    if thresholds.channels() != batch.channels() {
        return Err(QuantError::ChannelMismatch {
            expected: thresholds.channels(),
            actual: batch.channels(),
        });
    }
    Ok(())
}
