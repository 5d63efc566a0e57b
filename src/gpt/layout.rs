//! Sector layout of an image
use super::{
    error::*,
    header::PARTITION_ENTRY_SIZE,
    partition::{encode_name, Name, PartitionEntry, PartitionSpec, MIN_PARTITIONS_BYTES},
};
use crate::{guid::Guid, types::*};
use core::convert::TryFrom;
use log::{debug, warn};
use rand::RngCore;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::io::{self, Read, Seek, SeekFrom};

/// Smallest image built when no explicit size is requested, in blocks.
pub const DEFAULT_MIN_IMAGE_BLOCKS: u64 = 2048;

/// Blocks before the primary partition array, the MBR and the GPT header.
const LEADING_BLOCKS: u64 = 2;

/// Image sizing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", default)
)]
pub struct ImageConfig {
    /// Logical block size of the image.
    pub block_size: BlockSize,

    /// Image is at least this many blocks, when `image_blocks` is unset.
    pub min_image_blocks: u64,

    /// Exact image size in blocks. Too small for the partitions is an error.
    pub image_blocks: Option<u64>,

    /// Disk GUID. Random when unset or zero.
    pub disk_guid: Option<Guid>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            block_size: BlockSize::default(),
            min_image_blocks: DEFAULT_MIN_IMAGE_BLOCKS,
            image_blocks: None,
            disk_guid: None,
        }
    }
}

/// A partition with its place in the image decided.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPartition {
    /// Partition type GUID, never zero
    pub partition_type: Guid,

    /// Unique partition GUID, never zero
    pub guid: Guid,

    /// Attribute bits
    pub attributes: u64,

    /// Encoded name
    pub name: Name,

    /// First block
    pub start: Block,

    /// Length in blocks, never zero
    pub length: u64,

    /// Bytes of payload found when planning
    pub payload_size: Size,
}

impl PlannedPartition {
    /// Last block, inclusive.
    pub fn end(&self) -> Block {
        self.start + (self.length - 1)
    }

    /// The partition entry describing this partition.
    pub fn entry(&self) -> PartitionEntry {
        PartitionEntry {
            partition_type: self.partition_type,
            guid: self.guid,
            start: self.start,
            end: self.end(),
            attributes: self.attributes,
            name: self.name.clone(),
        }
    }
}

/// The finished layout of an image.
///
/// ```text
/// | MBR | Header | Array | Partitions... | free | Array | Header |
/// 0     1        2       first_usable           alt_array alt_header
/// ```
///
/// Once built, every block address and byte offset in the plan is known to
/// fit in a `u64`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    block_size: BlockSize,
    blocks: u64,
    header_blocks: u64,
    disk_guid: Guid,
    partitions: Vec<PlannedPartition>,
}

/// Size a payload by seeking to its end, then rewind it.
fn probe_payload<S: Seek>(payload: &mut S) -> io::Result<Size> {
    let len = payload.seek(SeekFrom::End(0))?;
    payload.seek(SeekFrom::Start(0))?;
    Ok(Size::from_bytes(len))
}

impl LayoutPlan {
    /// Lay out `specs`, in order.
    ///
    /// Partitions are packed one after the other, unless one asks to start
    /// later. Missing partition and disk GUIDs are drawn from `rng`.
    ///
    /// `specs` is only mutated to size, and rewind, the payloads.
    ///
    /// # Errors
    ///
    /// - [`Error::NoPartitions`] if `specs` is empty.
    /// - [`Error::MissingType`] if a partition type is the zero GUID.
    /// - [`Error::Payload`] if a payload can't be sized.
    /// - [`Error::Overlap`] if a partition would start before the end of the
    ///   previous one, or the primary partition array.
    /// - [`Error::EmptyPartition`] if a partition would be zero blocks.
    /// - [`Error::ImageTooSmall`] if `config.image_blocks` can't fit everything.
    /// - [`Error::Overflow`] if the image isn't addressable in 64 bits.
    pub fn new<S, R>(
        specs: &mut [PartitionSpec<S>],
        config: &ImageConfig,
        rng: &mut R,
    ) -> Result<Self>
    where
        S: Read + Seek,
        R: RngCore + ?Sized,
    {
        let disk_guid = match config.disk_guid {
            Some(guid) if !guid.is_zero() => guid,
            _ => Guid::random_from(rng),
        };
        if specs.is_empty() {
            return Err(Error::NoPartitions);
        }
        let block_size = config.block_size;

        let count = u32::try_from(specs.len()).map_err(|_| Error::Overflow)?;
        let array_size = Size::from_bytes(u64::from(count) * u64::from(PARTITION_ENTRY_SIZE));
        let header_blocks = block_size
            .blocks_for(array_size)
            .max(block_size.blocks_for(MIN_PARTITIONS_BYTES));
        let first_usable = Block(LEADING_BLOCKS + header_blocks);

        let mut cursor = first_usable;
        let mut partitions = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter_mut().enumerate() {
            let index = i + 1;
            if spec.partition_type.is_zero() {
                return Err(Error::MissingType(index));
            }
            let guid = if spec.guid.is_zero() {
                Guid::random_from(rng)
            } else {
                spec.guid
            };
            let payload_size = probe_payload(&mut spec.payload)
                .map_err(|source| Error::Payload { index, source })?;

            let start = match spec.start {
                Some(start) if start < cursor => {
                    return Err(Error::Overlap {
                        index,
                        start: start.0,
                        cursor: cursor.0,
                    })
                }
                Some(start) => start,
                None => cursor,
            };
            let length = spec
                .length
                .unwrap_or_else(|| block_size.blocks_for(payload_size));
            if length == 0 {
                return Err(Error::EmptyPartition(index));
            }
            cursor = start.checked_add(length)?;

            let name = match &spec.name {
                Some(name) => name.clone(),
                None => format!("part{}", index),
            };
            let (encoded, truncated) = encode_name(&name);
            if truncated {
                warn!(
                    "Partition {} name {:?} truncated to {} characters",
                    index,
                    name,
                    encoded.len()
                );
            }
            debug!(
                "Partition {} {:?}: {} blocks at {}, {} of payload",
                index, name, length, start, payload_size
            );
            partitions.push(PlannedPartition {
                partition_type: spec.partition_type,
                guid,
                attributes: spec.attributes,
                name: encoded,
                start,
                length,
                payload_size,
            });
        }

        // Room for the backup array and header
        let needed = cursor
            .0
            .checked_add(1 + header_blocks)
            .ok_or(Error::Overflow)?;
        let blocks = match config.image_blocks {
            None => needed.max(config.min_image_blocks),
            Some(requested) if requested < needed => {
                return Err(Error::ImageTooSmall { requested, needed })
            }
            Some(requested) => requested,
        };
        Block(blocks).checked_offset(block_size)?;

        let plan = Self {
            block_size,
            blocks,
            header_blocks,
            disk_guid,
            partitions,
        };
        debug!(
            "Planned {} partitions in {} blocks of {} bytes, disk {}, header area {} blocks",
            count, blocks, block_size, disk_guid, header_blocks
        );
        Ok(plan)
    }

    /// Logical block size.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// Total image size, in blocks.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Total image size, in bytes.
    pub fn image_size(&self) -> Size {
        Size::from_bytes(self.blocks * self.block_size.get())
    }

    /// Blocks in each copy of the partition array.
    pub fn header_blocks(&self) -> u64 {
        self.header_blocks
    }

    /// First block partitions may use.
    pub fn first_usable(&self) -> Block {
        Block(LEADING_BLOCKS + self.header_blocks)
    }

    /// Last block partitions may use.
    pub fn last_usable(&self) -> Block {
        self.alt_array() - 1
    }

    /// Start of the backup partition array.
    pub fn alt_array(&self) -> Block {
        Block(self.blocks - 1 - self.header_blocks)
    }

    /// The backup header, the last block.
    pub fn alt_header(&self) -> Block {
        Block(self.blocks - 1)
    }

    /// Disk GUID.
    pub fn disk_guid(&self) -> Guid {
        self.disk_guid
    }

    /// Partitions, in on-disk order.
    pub fn partitions(&self) -> &[PlannedPartition] {
        &self.partitions
    }

    /// Number of partitions. Checked to fit when planning.
    pub(crate) fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }
}
