//! Reading images back, to check them
use super::{
    error::*,
    header::{Header, PARTITION_ENTRY_SIZE},
    partition::{calculate_part_crc, PartitionEntry},
};
use crate::{guid::Guid, mbr::ProtectiveMbr, types::*};
use core::convert::TryFrom;
use std::io::{self, prelude::*, SeekFrom};

/// What [`verify_image`] found.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedImage {
    /// Disk GUID
    pub disk_guid: Guid,

    /// The primary header
    pub primary: Header,

    /// The backup header
    pub alt: Header,

    /// Partition entries, in on-disk order
    pub partitions: Vec<PartitionEntry>,
}

fn read_at<R: Read + Seek>(source: &mut R, offset: Offset, buf: &mut [u8]) -> Result<()> {
    source.seek(SeekFrom::Start(offset.get())).map_err(Error::Read)?;
    source.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::NotEnough,
        _ => Error::Read(e),
    })
}

/// Cross check the two headers.
fn validate(primary: &Header, alt: &Header, last_lba: Block) -> Result<()> {
    if primary.this != Block(1) || primary.alt != last_lba {
        return Err(Error::Invalid("Corrupt Primary GPT Header"));
    }
    if alt.this != last_lba || alt.alt != Block(1) {
        return Err(Error::Invalid("Corrupt Backup GPT Header"));
    }
    if primary.guid != alt.guid
        || primary.partitions != alt.partitions
        || primary.partition_size != alt.partition_size
        || primary.first_usable != alt.first_usable
        || primary.last_usable != alt.last_usable
        || primary.partitions_crc32 != alt.partitions_crc32
    {
        return Err(Error::Invalid("Primary and Backup GPT Headers differ"));
    }
    if primary.partition_size != PARTITION_ENTRY_SIZE {
        return Err(Error::Invalid("Unsupported partition entry size"));
    }
    if primary.first_usable > primary.last_usable || primary.last_usable >= alt.array {
        return Err(Error::Invalid("Invalid usable block range"));
    }
    Ok(())
}

/// Read and check the GPT of an image.
///
/// Checks the protective MBR, both headers and both partition arrays,
/// their CRCs, that they point at each other, and that the arrays are
/// identical. Partitions must be inside the usable blocks.
///
/// # Errors
///
/// - [`Error::NotEnough`] if the image is truncated.
/// - [`Error::Read`] if `source` fails to seek or read.
/// - [`Error::Invalid`] if anything doesn't check out.
pub fn verify_image<R: Read + Seek>(mut source: R, block_size: BlockSize) -> Result<VerifiedImage> {
    let b_size = block_size.as_usize();
    let disk_size = source.seek(SeekFrom::End(0)).map_err(Error::Read)?;
    if disk_size % block_size.get() != 0 {
        return Err(Error::Invalid("Image is not a whole number of blocks"));
    }
    let blocks = disk_size / block_size.get();
    if blocks < 3 {
        return Err(Error::NotEnough);
    }
    let last_lba = Block(blocks - 1);

    let mut buf = vec![0; b_size * 2];
    read_at(&mut source, Offset(0), &mut buf)?;
    let mut primary_bytes = &buf[..];
    let mbr = ProtectiveMbr::from_bytes(&mut primary_bytes, block_size)?;
    let primary = Header::from_bytes(&mut primary_bytes, block_size)?;
    if u64::from(mbr.size_lba()) != last_lba.0.min(u64::from(u32::MAX)) {
        return Err(Error::Invalid("Protective MBR doesn't cover the disk"));
    }

    read_at(&mut source, last_lba * block_size, &mut buf[..b_size])?;
    let alt = Header::from_bytes(&mut &buf[..b_size], block_size)?;
    validate(&primary, &alt, last_lba)?;

    let array_len = u64::from(primary.partitions) * u64::from(primary.partition_size);
    if array_len > disk_size {
        return Err(Error::Invalid("Partition array larger than the disk"));
    }
    let array_len = usize::try_from(array_len).map_err(|_| Error::Overflow)?;
    let mut arrays = Vec::with_capacity(2);
    for header in &[primary, alt] {
        let offset = header.array.checked_offset(block_size)?;
        let mut array = vec![0; array_len];
        read_at(&mut source, offset, &mut array)?;
        if calculate_part_crc(&array, primary.partitions as usize) != header.partitions_crc32 {
            return Err(Error::Invalid("Partition Array CRC32 mismatch"));
        }
        arrays.push(array);
    }
    if arrays[0] != arrays[1] {
        return Err(Error::Invalid("Primary and Backup Partition Arrays differ"));
    }

    let partitions = arrays[0]
        .chunks(PARTITION_ENTRY_SIZE as usize)
        .map(PartitionEntry::from_bytes)
        .collect::<Result<Vec<_>>>()?;
    for part in &partitions {
        if part.start < primary.first_usable
            || part.end < part.start
            || part.end > primary.last_usable
        {
            return Err(Error::Invalid("Partition outside the usable blocks"));
        }
    }

    Ok(VerifiedImage {
        disk_guid: primary.guid,
        primary,
        alt,
        partitions,
    })
}
