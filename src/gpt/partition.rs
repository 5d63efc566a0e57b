//! Handle partitions
use super::{error::*, header::PARTITION_ENTRY_SIZE};
use crate::{checksum::Crc32, guid::Guid, types::*};
use arrayvec::ArrayVec;
use core::{fmt, mem, slice};
use std::io::{Read, Seek};

/// A minimum of 16,384 bytes are reserved for the partition array.
///
/// With current GPT Partition entry sizes this means room for a minimum of
/// 128 partitions.
pub const MIN_PARTITIONS_BYTES: Size = Size::from_kib(16);

/// Maximum partition name length, in UTF-16 code units.
///
/// This fills the name field of a 128 byte entry, with no terminating NUL.
/// Longer names are truncated.
pub const PARTITION_NAME_LEN: usize = 36;

/// Encoded partition name.
pub type Name = ArrayVec<[u16; PARTITION_NAME_LEN]>;

/// Encode `name` as UTF-16, truncating to [`PARTITION_NAME_LEN`] units.
///
/// Returns the name and whether anything was cut off.
pub(crate) fn encode_name(name: &str) -> (Name, bool) {
    let mut out = Name::new();
    for unit in name.encode_utf16() {
        if out.try_push(unit).is_err() {
            // Don't leave half a surrogate pair behind
            if let Some(0xD800..=0xDBFF) = out.last().copied() {
                out.pop();
            }
            return (out, true);
        }
    }
    (out, false)
}

/// A partition to put in the image.
///
/// Built with [`PartitionSpec::new`] and the setters, then handed to
/// [`crate::LayoutPlan::new`]. The payload is sized during planning and
/// copied into the image when it's written.
pub struct PartitionSpec<S> {
    pub(crate) partition_type: Guid,
    pub(crate) guid: Guid,
    pub(crate) attributes: u64,
    pub(crate) name: Option<String>,
    pub(crate) start: Option<Block>,
    pub(crate) length: Option<u64>,
    pub(crate) payload: S,
}

impl<S: Read + Seek> PartitionSpec<S> {
    /// A partition of type `partition_type` holding `payload`.
    ///
    /// The partition GUID is random unless set with [`PartitionSpec::guid`].
    pub fn new<T: Into<Guid>>(partition_type: T, payload: S) -> Self {
        Self {
            partition_type: partition_type.into(),
            guid: Guid::ZERO,
            attributes: 0,
            name: None,
            start: None,
            length: None,
            payload,
        }
    }

    /// Unique partition GUID. The zero GUID means pick one at random.
    pub fn guid(mut self, guid: Guid) -> Self {
        self.guid = guid;
        self
    }

    /// Partition name. Defaults to `part<N>`, N counting from 1.
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Partition attribute bits.
    pub fn attributes(mut self, attributes: u64) -> Self {
        self.attributes = attributes;
        self
    }

    /// Start the partition at `start`, instead of right after the previous one.
    pub fn start(mut self, start: Block) -> Self {
        self.start = Some(start);
        self
    }

    /// Make the partition `length` blocks long, instead of fitting the payload.
    ///
    /// Payloads longer than this are truncated.
    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

impl<S> PartitionSpec<S> {
    /// The payload source.
    pub fn payload(&mut self) -> &mut S {
        &mut self.payload
    }

    /// Consume the spec, returning the payload source.
    pub fn into_payload(self) -> S {
        self.payload
    }
}

impl<S> fmt::Debug for PartitionSpec<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionSpec")
            .field("partition_type", &self.partition_type)
            .field("guid", &self.guid)
            .field("attributes", &self.attributes)
            .field("name", &self.name)
            .field("start", &self.start)
            .field("length", &self.length)
            .finish()
    }
}

/// Raw partition structure
///
/// All fields are stored little endian.
#[derive(Copy, Clone)]
#[repr(C, packed)]
struct RawPartition {
    /// Defines the type of this partition
    partition_type_guid: [u8; 16],

    /// Unique identifer for this partition
    partition_guid: [u8; 16],

    /// Where it starts on disk
    starting_lba: u64,

    /// Where it ends on disk, inclusive
    ending_lba: u64,

    /// Attributes
    attributes: u64,

    /// NUL padded UTF-16LE name
    name: [u16; PARTITION_NAME_LEN],
}

/// A GPT Partition entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartitionEntry {
    /// Defines the type of this partition
    pub partition_type: Guid,

    /// Unique identifer for this partition
    pub guid: Guid,

    /// Where it starts on disk
    pub start: Block,

    /// Where it ends on disk, inclusive
    pub end: Block,

    /// Attributes
    pub attributes: u64,

    /// UTF-16 name, without padding
    pub name: Name,
}

impl PartitionEntry {
    /// Partition name, lossily decoded.
    pub fn name(&self) -> String {
        String::from_utf16_lossy(&self.name)
    }

    /// Length, in blocks.
    pub fn blocks(&self) -> u64 {
        if self.end < self.start {
            return 0;
        }
        (self.end.0 - self.start.0).saturating_add(1)
    }

    /// Read a partition entry from `source`.
    ///
    /// # Errors
    ///
    /// - If `source` is smaller than [`PARTITION_ENTRY_SIZE`]
    pub fn from_bytes(source: &[u8]) -> Result<Self> {
        if source.len() < mem::size_of::<RawPartition>() {
            return Err(Error::NotEnough);
        }
        // # Safety
        // - `RawPartition` is repr(C, packed), and any bytes are valid
        // - `source` is checked to be large enough
        #[allow(clippy::cast_ptr_alignment)]
        let raw = unsafe { (source.as_ptr() as *const RawPartition).read_unaligned() };
        let raw_name = raw.name;
        let name = raw_name
            .iter()
            .map(|u| u16::from_le(*u))
            .take_while(|u| *u != 0)
            .collect();
        Ok(Self {
            partition_type: Guid::from_bytes(raw.partition_type_guid),
            guid: Guid::from_bytes(raw.partition_guid),
            start: Block(u64::from_le(raw.starting_lba)),
            end: Block(u64::from_le(raw.ending_lba)),
            attributes: u64::from_le(raw.attributes),
            name,
        })
    }

    /// Write this partition entry to `dest`, which must be at least
    /// [`PARTITION_ENTRY_SIZE`] bytes.
    pub fn to_bytes(&self, dest: &mut [u8]) {
        let mut name = [0u16; PARTITION_NAME_LEN];
        for (d, s) in name.iter_mut().zip(self.name.iter()) {
            *d = s.to_le();
        }
        let raw = RawPartition {
            partition_type_guid: self.partition_type.to_bytes(),
            partition_guid: self.guid.to_bytes(),
            starting_lba: self.start.0.to_le(),
            ending_lba: self.end.0.to_le(),
            attributes: self.attributes.to_le(),
            name,
        };
        // # Safety
        // - `RawPartition` is repr(C, packed)
        // - size_of used
        let raw = unsafe {
            slice::from_raw_parts(
                (&raw as *const RawPartition) as *const u8,
                mem::size_of::<RawPartition>(),
            )
        };
        dest[..PARTITION_ENTRY_SIZE as usize].copy_from_slice(raw);
    }
}

/// Calculate the partition array CRC32 over the first `partitions` entries
/// of `array`.
pub fn calculate_part_crc(array: &[u8], partitions: usize) -> u32 {
    let mut digest = Crc32::new();
    for entry in array
        .chunks(PARTITION_ENTRY_SIZE as usize)
        .take(partitions)
    {
        digest.update(entry);
    }
    digest.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{checksum::crc32, partitions::PartitionType, util::Result};
    use pretty_assertions::assert_eq;
    use static_assertions::*;

    assert_eq_size!(RawPartition, [u8; PARTITION_ENTRY_SIZE as usize]);

    fn entry(name: &str) -> PartitionEntry {
        PartitionEntry {
            partition_type: PartitionType::EfiSystem.to_guid(),
            guid: Guid::from_fields(1, 2, 3, [4, 5, 6, 7, 8, 9, 10, 11]),
            start: Block(34),
            end: Block(35),
            attributes: 1 << 63,
            name: encode_name(name).0,
        }
    }

    #[test]
    fn field_offsets() {
        let mut buf = [0xAB; 128];
        entry("EFI").to_bytes(&mut buf);
        assert_eq!(&buf[..4], &[0x28, 0x73, 0x2A, 0xC1]);
        assert_eq!(&buf[16..20], &[1, 0, 0, 0]);
        assert_eq!(&buf[32..40], &34u64.to_le_bytes());
        assert_eq!(&buf[40..48], &35u64.to_le_bytes());
        assert_eq!(&buf[48..56], &(1u64 << 63).to_le_bytes());
        assert_eq!(&buf[56..62], &[b'E', 0, b'F', 0, b'I', 0]);
        assert!(buf[62..].iter().all(|b| *b == 0));
    }

    #[test]
    fn read_part() -> Result {
        let mut buf = [0; 128];
        let written = entry("root filesystem");
        written.to_bytes(&mut buf);
        let read = PartitionEntry::from_bytes(&buf)?;
        assert_eq!(read, written);
        assert_eq!(read.name(), "root filesystem");
        assert_eq!(read.blocks(), 2);
        Ok(())
    }

    #[test]
    fn read_short_part() {
        let buf = [0; 127];
        let err = PartitionEntry::from_bytes(&buf).unwrap_err();
        assert!(matches!(err, Error::NotEnough));
    }

    #[test]
    fn name_limit() -> Result {
        let exact = "a".repeat(PARTITION_NAME_LEN);
        let (name, truncated) = encode_name(&exact);
        assert_eq!(name.len(), PARTITION_NAME_LEN);
        assert!(!truncated);

        let long = "b".repeat(PARTITION_NAME_LEN + 5);
        let (name, truncated) = encode_name(&long);
        assert_eq!(name.len(), PARTITION_NAME_LEN);
        assert!(truncated);

        let mut buf = [0; 128];
        PartitionEntry { name, ..entry("") }.to_bytes(&mut buf);
        let read = PartitionEntry::from_bytes(&buf)?;
        assert_eq!(read.name(), "b".repeat(PARTITION_NAME_LEN));
        Ok(())
    }

    #[test]
    fn name_utf16() {
        let (name, _) = encode_name("ñ€");
        assert_eq!(name.as_slice(), &[0x00F1u16, 0x20AC]);
    }

    #[test]
    fn name_limit_keeps_surrogate_pairs() {
        // U+1F600 is two UTF-16 units, the first of them the 36th unit
        let split = format!("{}\u{1F600}", "a".repeat(PARTITION_NAME_LEN - 1));
        let (name, truncated) = encode_name(&split);
        assert!(truncated);
        assert_eq!(name.len(), PARTITION_NAME_LEN - 1);
        assert_eq!(String::from_utf16(&name).ok(), Some("a".repeat(PARTITION_NAME_LEN - 1)));

        // Both units fit
        let fits = format!("{}\u{1F600}x", "a".repeat(PARTITION_NAME_LEN - 2));
        let (name, truncated) = encode_name(&fits);
        assert!(truncated);
        assert_eq!(name.len(), PARTITION_NAME_LEN);
        assert_eq!(
            String::from_utf16(&name).ok(),
            Some(format!("{}\u{1F600}", "a".repeat(PARTITION_NAME_LEN - 2)))
        );
    }

    #[test]
    fn part_crc_counts_entries_only() {
        let mut array = vec![0; 512];
        entry("one").to_bytes(&mut array[..128]);
        entry("two").to_bytes(&mut array[128..256]);
        assert_eq!(calculate_part_crc(&array, 2), crc32(&array[..256]));
        assert_eq!(calculate_part_crc(&array, 1), crc32(&array[..128]));
    }
}
