//! Per-channel multi-threshold quantization.
//!
//! Converts batches of per-channel `f32` activations into `i8` codes by
//! counting how many of a channel's 255 sorted thresholds lie strictly below
//! each value. Three families are provided:
//!
//! 1. Exact kernels ([`core::exact`]): linear reference, binary search,
//!    monotonic-order scan and a channel-parallel dispatcher. All produce
//!    identical codes.
//! 2. A per-tensor affine approximation ([`core::affine`]).
//! 3. A lossy lookup-table engine ([`core::lossy`]) with scalar and
//!    8-lane vectorized index computation ([`simd`]).

pub mod core;
pub mod error;
pub mod simd;
pub mod storage;

pub use crate::core::affine::{DeviationReport, PerTensorAffine};
pub use crate::core::batch::{Batch, Codes, Layout};
pub use crate::core::exact::{ExactQuantizer, IterationOrder, Strategy};
pub use crate::core::lossy::{LazyLookup, LookupTable, LossyQuantizer, LossyThresholdLookup};
pub use crate::core::runtime::{thread_count, PoolConfig, WorkerPool};
pub use crate::core::thresholds::{ThresholdSet, MAX_RANK, THRESHOLDS_PER_CHANNEL};
pub use crate::core::Quantizer;
pub use crate::error::{QuantError, Result};
