pub mod format;
pub mod mmap;

pub use mmap::{load_json, save_json, write_thresholds, StorageError, ThresholdFile};
