use crate::core::thresholds::{ThresholdSet, THRESHOLDS_PER_CHANNEL};
use crate::error::QuantError;
use crate::storage::format::{Header, HEADER_SIZE, MAGIC, VERSION};
use bytemuck::bytes_of;
use crc32fast::Hasher;
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid magic bytes")]
    InvalidMagic,
    #[error("Unsupported version {0}")]
    UnsupportedVersion(u32),
    #[error("File too small")]
    FileTooSmall,
    #[error("Checksum mismatch")]
    ChecksumMismatch,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid thresholds: {0}")]
    Thresholds(#[from] QuantError),
}

/// Memory-mapped threshold file.
pub struct ThresholdFile {
    mmap: Mmap,
}

impl ThresholdFile {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < HEADER_SIZE {
            return Err(StorageError::FileTooSmall);
        }

        let header = bytemuck::from_bytes::<Header>(&mmap[..HEADER_SIZE]);
        if header.magic != MAGIC {
            return Err(StorageError::InvalidMagic);
        }
        if header.version != VERSION {
            return Err(StorageError::UnsupportedVersion(header.version));
        }

        let payload = header.channels as usize * header.per_channel as usize * 4;
        if mmap.len() < HEADER_SIZE + payload {
            return Err(StorageError::FileTooSmall);
        }

        let mut hasher = Hasher::new();
        hasher.update(&mmap[HEADER_SIZE..HEADER_SIZE + payload]);
        if hasher.finalize() != header.checksum {
            return Err(StorageError::ChecksumMismatch);
        }

        Ok(Self { mmap })
    }

    pub fn header(&self) -> &Header {
        bytemuck::from_bytes::<Header>(&self.mmap[..HEADER_SIZE])
    }

    fn payload(&self) -> &[u8] {
        let header = self.header();
        let len = header.channels as usize * header.per_channel as usize;
        &self.mmap[HEADER_SIZE..HEADER_SIZE + len * 4]
    }

    /// Thresholds borrowed from the mapping. The payload is little-endian, so
    /// the zero-copy view only exists on little-endian targets.
    #[cfg(target_endian = "little")]
    pub fn values(&self) -> &[f32] {
        bytemuck::cast_slice(self.payload())
    }

    /// Thresholds decoded from the little-endian payload.
    pub fn decode_values(&self) -> Vec<f32> {
        self.payload()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    /// Validated copy of the thresholds.
    pub fn to_threshold_set(&self) -> Result<ThresholdSet, StorageError> {
        let header = self.header();
        if header.per_channel as usize != THRESHOLDS_PER_CHANNEL {
            return Err(QuantError::ThresholdCount {
                expected: THRESHOLDS_PER_CHANNEL,
                actual: header.per_channel as usize,
            }
            .into());
        }
        Ok(ThresholdSet::new(self.decode_values(), header.channels as usize)?)
    }
}

pub fn write_thresholds(path: &Path, thresholds: &ThresholdSet) -> Result<(), StorageError> {
    let payload: Vec<u8> = thresholds
        .as_slice()
        .iter()
        .flat_map(|t| t.to_le_bytes())
        .collect();
    let mut hasher = Hasher::new();
    hasher.update(&payload);

    let header = Header {
        magic: MAGIC,
        version: VERSION,
        channels: thresholds.channels() as u32,
        per_channel: THRESHOLDS_PER_CHANNEL as u32,
        checksum: hasher.finalize(),
        padding: [0; 2],
    };

    let mut file = File::create(path)?;
    file.write_all(bytes_of(&header))?;
    file.write_all(&payload)?;
    file.flush()?;

    info!(path = %path.display(), channels = thresholds.channels(), "thresholds written");
    Ok(())
}

pub fn load_json(path: &Path) -> Result<ThresholdSet, StorageError> {
    let text = std::fs::read_to_string(path)?;
    Ok(ThresholdSet::from_json_str(&text)?)
}

pub fn save_json(path: &Path, thresholds: &ThresholdSet) -> Result<(), StorageError> {
    std::fs::write(path, thresholds.to_json_string()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::irregular_thresholds;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_load_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let set = irregular_thresholds(5, 8);
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path();

        write_thresholds(path, &set)?;
        let file = ThresholdFile::load(path)?;

        let header = file.header();
        assert_eq!(header.magic, *b"MTHRESH1");
        assert_eq!(header.channels, 5);
        assert_eq!(header.per_channel, 255);
        assert_eq!(file.decode_values(), set.as_slice());
        #[cfg(target_endian = "little")]
        assert_eq!(file.values(), set.as_slice());
        assert_eq!(file.to_threshold_set()?, set);

        // Payload is little-endian whatever the host.
        let bytes = std::fs::read(path)?;
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 4], &set.as_slice()[0].to_le_bytes());
        let last = bytes.len() - 4;
        assert_eq!(&bytes[last..], &set.as_slice()[5 * 255 - 1].to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_corruption_detected() -> Result<(), Box<dyn std::error::Error>> {
        let set = irregular_thresholds(2, 1);
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path();
        write_thresholds(path, &set)?;

        let mut bytes = std::fs::read(path)?;
        bytes[HEADER_SIZE + 17] ^= 0xFF;
        std::fs::write(path, &bytes)?;
        assert!(matches!(ThresholdFile::load(path), Err(StorageError::ChecksumMismatch)));

        bytes.truncate(HEADER_SIZE + 8);
        std::fs::write(path, &bytes)?;
        assert!(matches!(ThresholdFile::load(path), Err(StorageError::FileTooSmall)));

        std::fs::write(path, [0u8; 64])?;
        assert!(matches!(ThresholdFile::load(path), Err(StorageError::InvalidMagic)));

        std::fs::write(path, [0u8; 4])?;
        assert!(matches!(ThresholdFile::load(path), Err(StorageError::FileTooSmall)));
        Ok(())
    }

    #[test]
    fn test_json_file() -> Result<(), Box<dyn std::error::Error>> {
        let set = irregular_thresholds(3, 4);
        let temp_file = NamedTempFile::new()?;
        save_json(temp_file.path(), &set)?;
        assert_eq!(load_json(temp_file.path())?, set);

        std::fs::write(temp_file.path(), r#"{"channels":2,"values":[0.0]}"#)?;
        assert!(matches!(
            load_json(temp_file.path()),
            Err(StorageError::Json(_))
        ));
        Ok(())
    }
}
