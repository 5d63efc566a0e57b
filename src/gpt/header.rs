//! Handle GPT header
use super::{error::*, layout::LayoutPlan};
use crate::{checksum::crc32, guid::Guid, types::*};
use core::{convert::TryInto, mem, slice};

/// "EFI PART" constant as a u64
const EFI_PART: u64 = 0x5452_4150_2049_4645;

/// Current/supported GPT Header revision
const REVISION: u32 = 0x0001_0000;

/// Declared GPT Header size, and how many bytes the header CRC covers.
///
/// Most tools write 92, the size of the header structure. Images built here
/// declare 96, the structure padded with four zero bytes. Both are valid.
pub const HEADER_SIZE: u32 = 96;

/// Smallest valid header, the structure itself.
const MIN_HEADER_SIZE: u32 = 92;

/// Current/supported GPT Partition Entry size.
pub const PARTITION_ENTRY_SIZE: u32 = 128;

/// Byte offset of `header_crc32` within the header.
const HEADER_CRC_OFFSET: usize = 16;

/// The GPT Header Structure
///
/// All fields are stored little endian.
#[derive(Debug, Copy, Clone)]
#[repr(C, packed)]
struct RawHeader {
    /// Hard-coded to [`EFI_PART`]
    signature: u64,

    /// Hard-coded to [`REVISION`]
    revision: u32,

    /// Soft-coded to [`HEADER_SIZE`]
    ///
    /// Must be header_size >= 92 and header_size <= logical block size.
    header_size: u32,

    /// CRC32(bytes[0..header_size])
    ///
    /// Set to zero when computing CRC
    header_crc32: u32,

    /// Must be zero
    _reserved: u32,

    /// The logical block address we reside in
    this_lba: u64,

    /// The logical block address the other header is in
    alt_lba: u64,

    /// Where partitions can start
    first_usable_lba: u64,

    /// Where partitions must end
    last_usable_lba: u64,

    /// Disk GUID, mixed endian.
    disk_guid: [u8; 16],

    /// Where our partition array starts on disk.
    partition_array_start: u64,

    /// Number of partitions
    partitions: u32,

    /// Size of each partition entry structure.
    /// Must be 128 * 2^n, where n >= 0
    partition_size: u32,

    /// CRC32 of the partition array
    partitions_crc32: u32,
}

impl RawHeader {
    fn as_bytes(&self) -> &[u8] {
        // # Safety
        // - `RawHeader` is repr(C,packed), alignment 1
        // - Pointer will always be valid
        // - size_of used
        unsafe {
            slice::from_raw_parts(
                (self as *const RawHeader) as *const u8,
                mem::size_of::<RawHeader>(),
            )
        }
    }
}

/// Calculate the header CRC over the first `header_size` bytes of `header`,
/// with the CRC field zeroed.
fn calculate_crc(header: &[u8], header_size: usize) -> u32 {
    let mut buf = header[..header_size].to_vec();
    buf[HEADER_CRC_OFFSET..][..4].copy_from_slice(&[0; 4]);
    crc32(&buf)
}

/// A GPT Header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    /// The logical block address this header is in
    pub this: Block,

    /// The logical block address the other header is in
    pub alt: Block,

    /// First valid LBA for partitions
    pub first_usable: Block,

    /// Last valid LBA for partitions
    pub last_usable: Block,

    /// Disk GUID
    pub guid: Guid,

    /// Number of partitions
    pub partitions: u32,

    /// Where the partition array starts on disk.
    pub array: Block,

    /// CRC32 of the partition array
    pub partitions_crc32: u32,

    /// Size of each partition entry structure.
    /// Must be 128 * 2^n, where n >= 0
    pub partition_size: u32,

    /// Declared header size, what the CRC covers.
    pub header_size: u32,
}

impl Header {
    /// The primary header for `plan`, at LBA 1.
    pub fn primary(plan: &LayoutPlan, partitions_crc32: u32) -> Self {
        Self {
            this: Block(1),
            alt: plan.alt_header(),
            first_usable: plan.first_usable(),
            last_usable: plan.last_usable(),
            guid: plan.disk_guid(),
            partitions: plan.partition_count(),
            array: Block(2),
            partitions_crc32,
            partition_size: PARTITION_ENTRY_SIZE,
            header_size: HEADER_SIZE,
        }
    }

    /// The backup copy of this primary header.
    ///
    /// Identical except for swapped self/other LBAs and the array location.
    pub fn mirrored(&self, alt_array: Block) -> Self {
        Self {
            this: self.alt,
            alt: self.this,
            array: alt_array,
            ..*self
        }
    }
}

impl Header {
    /// Read the GPT Header from a byte slice
    ///
    /// # Errors
    ///
    /// - If `source` does not have enough data
    /// - The GPT is invalid.
    ///
    /// # Details
    ///
    /// On success, `source` is advanced by exactly `block_size` bytes.
    pub fn from_bytes(source: &mut &[u8], block_size: BlockSize) -> Result<Self> {
        let b_size = block_size.as_usize();
        if source.len() < b_size {
            return Err(Error::NotEnough);
        }
        // # Safety
        // - `source` is always a valid pointer
        // - `source` is at least one block, more than a `RawHeader`
        // - `RawHeader` is repr(C, packed)
        #[allow(clippy::cast_ptr_alignment)]
        let raw = unsafe { (source.as_ptr() as *const RawHeader).read_unaligned() };
        if u64::from_le(raw.signature) != EFI_PART {
            return Err(Error::Invalid("Invalid Signature"));
        }
        let header_size = u32::from_le(raw.header_size);
        if header_size < MIN_HEADER_SIZE || u64::from(header_size) > block_size.get() {
            return Err(Error::Invalid("Invalid header size"));
        }
        let header_size_bytes = header_size.try_into().map_err(|_| Error::Overflow)?;
        if u32::from_le(raw.header_crc32) != calculate_crc(source, header_size_bytes) {
            return Err(Error::Invalid("CRC mismatch"));
        }
        let header = Header {
            this: Block(u64::from_le(raw.this_lba)),
            alt: Block(u64::from_le(raw.alt_lba)),
            first_usable: Block(u64::from_le(raw.first_usable_lba)),
            last_usable: Block(u64::from_le(raw.last_usable_lba)),
            guid: Guid::from_bytes(raw.disk_guid),
            partitions: u32::from_le(raw.partitions),
            array: Block(u64::from_le(raw.partition_array_start)),
            partitions_crc32: u32::from_le(raw.partitions_crc32),
            partition_size: u32::from_le(raw.partition_size),
            header_size,
        };
        *source = &source[b_size..];
        Ok(header)
    }

    /// Write the GPT header to `dest`, with its CRC.
    ///
    /// # Errors
    ///
    /// - If `dest` is smaller than the declared header size.
    ///
    /// # Details
    ///
    /// Exactly `header_size` bytes are written. Bytes past the header
    /// structure are zero.
    pub fn to_bytes(&self, dest: &mut [u8]) -> Result<()> {
        let size = self.header_size as usize;
        if size < MIN_HEADER_SIZE as usize || dest.len() < size {
            return Err(Error::NotEnough);
        }
        let raw = RawHeader {
            signature: EFI_PART.to_le(),
            revision: REVISION.to_le(),
            header_size: self.header_size.to_le(),
            header_crc32: 0,
            _reserved: 0,
            this_lba: self.this.0.to_le(),
            alt_lba: self.alt.0.to_le(),
            first_usable_lba: self.first_usable.0.to_le(),
            last_usable_lba: self.last_usable.0.to_le(),
            disk_guid: self.guid.to_bytes(),
            partition_array_start: self.array.0.to_le(),
            partitions: self.partitions.to_le(),
            partition_size: self.partition_size.to_le(),
            partitions_crc32: self.partitions_crc32.to_le(),
        };
        let dest = &mut dest[..size];
        let raw = raw.as_bytes();
        dest[..raw.len()].copy_from_slice(raw);
        for b in &mut dest[raw.len()..] {
            *b = 0;
        }
        let crc = calculate_crc(dest, size);
        dest[HEADER_CRC_OFFSET..][..4].copy_from_slice(&crc.to_le_bytes());
        Ok(())
    }
}
