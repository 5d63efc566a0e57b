//! Protective MBR
use crate::{
    gpt::error::{Error, Result},
    types::*,
};
use core::{convert::TryFrom, mem::size_of};

/// Bytes of the MBR proper. The rest of block zero is zero.
pub const MBR_SIZE: usize = 512;

/// Boot sector signature, `0x55 0xAA` on disk.
const SIGNATURE: u16 = 0xAA55;

/// MBR partition type for "GPT Protective".
const GPT_PROTECTIVE: u8 = 0xEE;

/// GPT Protective MBR
#[derive(PartialEq, Copy, Clone)]
#[repr(C, packed)]
pub struct ProtectiveMbr {
    /// Bios boot code. Unused by GPT.
    boot_code: [u8; 440],

    /// A unique signature. Unused by GPT.
    /// Hard-coded to 0.
    unique_signature: [u8; 4],

    /// Hard-coded to 0.
    unknown: [u8; 2],

    /// Hard-coded to one partition, covering the entire device.
    partitions: [MbrPart; 4],

    /// Hard-coded to 0xAA55-LE.
    signature: u16,
}

impl ProtectiveMbr {
    /// Creates a new Protective MBR
    ///
    /// `last_lba`, the last logical block address on the device.
    /// Devices too large for MBR are covered up to `u32::MAX` blocks.
    pub fn new(last_lba: Block) -> Self {
        Self {
            boot_code: [0u8; 440],
            unique_signature: [0u8; 4],
            unknown: [0u8; 2],
            partitions: [
                MbrPart {
                    boot: 0,
                    //
                    start_head: 0x00,
                    start_sector: 0x02,
                    start_track: 0x00,
                    //
                    os_type: GPT_PROTECTIVE,
                    // Technically incorrect?, but
                    // Existing implementations seem to do the same thing here.
                    end_head: 0xFF,
                    end_sector: 0xFF,
                    end_track: 0xFF,
                    //
                    start_lba: 1u32.to_le(),
                    size_lba: u32::try_from(last_lba.0)
                        .unwrap_or(u32::max_value())
                        .to_le(),
                },
                MbrPart::default(),
                MbrPart::default(),
                MbrPart::default(),
            ],
            signature: SIGNATURE.to_le(),
        }
    }

    /// Read a `ProtectiveMbr` from a byte slice.
    ///
    /// # Errors
    ///
    /// - If `source` is not at least `block_size` bytes.
    /// - If the MBR is invalid
    ///
    /// # Details
    ///
    /// On success, `source` is advanced by exactly `block_size` bytes.
    pub fn from_bytes(source: &mut &[u8], block_size: BlockSize) -> Result<Self> {
        let block_size = block_size.as_usize();
        if source.len() < block_size {
            return Err(Error::NotEnough);
        }
        // Safe because ProtectiveMbr is simple and repr(C, packed),
        // any value is valid, and we check the size of `source` above.
        #[allow(clippy::cast_ptr_alignment)]
        let mbr = unsafe {
            (source[..size_of::<ProtectiveMbr>()].as_ptr() as *const ProtectiveMbr)
                .read_unaligned()
        };
        let mbr = mbr.validate()?;
        *source = &source[block_size..];
        Ok(mbr)
    }

    /// Write a GPT Protective MBR to `dest`
    ///
    /// # Errors
    ///
    /// - If `dest` is not at least `block_size` bytes
    ///
    /// # Details
    ///
    /// On success, exactly `block_size` bytes will have been written to `dest`,
    /// everything past [`MBR_SIZE`] being zero.
    ///
    /// On error, `dest` is unchanged.
    pub fn write_bytes(&self, dest: &mut [u8], block_size: BlockSize) -> Result<()> {
        let block_size = block_size.as_usize();
        if dest.len() < block_size {
            return Err(Error::NotEnough);
        }
        let raw = self as *const ProtectiveMbr as *const u8;
        // Safe because we know the sizes
        let raw = unsafe { core::slice::from_raw_parts(raw, size_of::<ProtectiveMbr>()) };
        dest[..MBR_SIZE].copy_from_slice(raw);
        for b in &mut dest[MBR_SIZE..block_size] {
            *b = 0;
        }
        Ok(())
    }

    /// Number of blocks the protective partition claims.
    pub fn size_lba(&self) -> u32 {
        let parts = self.partitions;
        u32::from_le(parts[0].size_lba)
    }
}

// Private
impl ProtectiveMbr {
    /// Validate the Protective MBR.
    ///
    /// # Errors
    ///
    /// The MBR is considered invalid if:
    ///
    /// - The signature is not correct
    /// - The GPT Protective partition is missing
    /// - If other partitions exist
    fn validate(self) -> Result<Self> {
        if u16::from_le(self.signature) != SIGNATURE {
            return Err(Error::Invalid("MBR signature invalid. Expected 0xAA55"));
        }
        let parts = self.partitions;
        if parts[0].os_type != GPT_PROTECTIVE {
            return Err(Error::Invalid("Missing GPT Protective Partition"));
        }
        if u32::from_le(parts[0].start_lba) != 1 {
            return Err(Error::Invalid("GPT Protective Partition must start at LBA 1"));
        }
        for part in &parts[1..] {
            if *part != MbrPart::default() {
                return Err(Error::Invalid("Not a GUID Partition Table, MBR has real partitions"));
            }
        }
        Ok(self)
    }
}

/// Smaller Debug output.
impl core::fmt::Debug for ProtectiveMbr {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fmt.debug_struct("ProtectiveMbr")
            .field("partition 0", &{ self.partitions[0] })
            .finish()
    }
}

#[derive(Debug, Default, PartialEq, Copy, Clone)]
#[repr(C)]
struct MbrPart {
    /// Whether the partition is "bootable". Unused by GPT.
    /// Hard-coded to 0.
    boot: u8,

    /// Cylinder, Head, Sector. Unused by GPT.
    /// Hard-coded to 0x000200.
    start_head: u8,
    start_sector: u8,
    start_track: u8,

    /// Hard-coded to 0xEE, GPT Protective.
    os_type: u8,

    /// Cylinder, Head, Sector. Unused by GPT.
    /// De facto Hard-coded to 0xFFFFFF.
    end_head: u8,
    end_sector: u8,
    end_track: u8,

    /// Hard-coded to 1, the start of the GPT Header. Little endian.
    start_lba: u32,

    /// Size of the disk, in LBA, minus one. Little endian.
    size_lba: u32,
}
