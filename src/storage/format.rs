use bytemuck::{Pod, Zeroable};

pub const MAGIC: [u8; 8] = *b"MTHRESH1";
pub const VERSION: u32 = 1;

/// On-disk header of a threshold file, stored in host byte order. The payload
/// that follows is `channels × per_channel` little-endian `f32`s, channel
/// after channel.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Header {
    pub magic: [u8; 8],
    pub version: u32,
    pub channels: u32,
    pub per_channel: u32,
    pub checksum: u32, // crc32 of the payload
    pub padding: [u32; 2],
}

pub const HEADER_SIZE: usize = std::mem::size_of::<Header>();

// Ensure Header is 32 bytes
const _: () = assert!(HEADER_SIZE == 32);
