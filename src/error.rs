use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuantError>;

#[derive(Error, Debug)]
pub enum QuantError {
    #[error("batch of {len} values is not a multiple of {channels} channels")]
    ShapeMismatch { len: usize, channels: usize },
    #[error("channel count must be at least 1")]
    ZeroChannels,
    #[error("expected {expected} thresholds, got {actual}")]
    ThresholdCount { expected: usize, actual: usize },
    #[error("thresholds of channel {channel} decrease at index {index}")]
    UnsortedThresholds { channel: usize, index: usize },
    #[error("threshold {index} of channel {channel} is not finite")]
    NonFiniteThreshold { channel: usize, index: usize },
    #[error("vectorized lookup needs a multiple of {width} values, got {len}")]
    UnsupportedVectorWidth { len: usize, width: usize },
    #[error("precision of {digits} digits exceeds the maximum of {max}")]
    InvalidPrecision { digits: u32, max: u32 },
    #[error("lookup table of {size} entries exceeds the limit of {max}")]
    TableTooLarge { size: u64, max: u64 },
    #[error("{collisions} thresholds share a table slot at {digits} digits")]
    PrecisionTooLow { digits: u32, collisions: usize },
    #[error("lookup tables were built from a different threshold set")]
    TableMismatch,
    #[error("output buffer holds {actual} codes, {expected} needed")]
    OutputLength { expected: usize, actual: usize },
    #[error("quantizer built for {expected} channels, batch has {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
