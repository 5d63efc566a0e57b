//! CRC32 used by GPT headers and partition entry arrays.
//!
//! This is the reflected IEEE polynomial `0xEDB88320`, starting from all ones
//! and complemented at the end. The same one zip and Ethernet use.
use crc::{crc32 as ieee, Hasher32};

/// CRC32 of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    ieee::checksum_ieee(bytes)
}

/// Incremental CRC32, for data written out in pieces.
pub struct Crc32(ieee::Digest);

impl Crc32 {
    /// Start a new checksum.
    pub fn new() -> Self {
        Self(ieee::Digest::new(ieee::IEEE))
    }

    /// Feed `bytes` into the checksum.
    pub fn update(&mut self, bytes: &[u8]) {
        self.0.write(bytes);
    }

    /// The checksum of everything fed so far.
    pub fn finish(&self) -> u32 {
        self.0.sum32()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
