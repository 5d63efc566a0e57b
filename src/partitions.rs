//! Known partition types
use crate::guid::Guid;

/// Recognized GPT Partition Types
///
/// This is non-exhaustive,
/// it's unrecommended to match on this.
///
/// A GUID that matches against the [`PartitionType::Unknown`] variant
/// is not guaranteed to continue to do so, as more partition types
/// become recognized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartitionType {
    /// Unused entry
    Unused,

    /// The partition type is unknown.
    Unknown,

    /// EFI System Partition
    EfiSystem,

    /// BIOS Boot partition, for GRUB on legacy BIOS systems
    BiosBoot,

    /// Microsoft Basic Data, also used for FAT and NTFS data partitions
    MicrosoftBasicData,

    /// Linux Filesystem
    LinuxFilesystemData,

    /// Linux Swap
    LinuxSwap,
}

// Helps macro
#[allow(non_upper_case_globals)]
mod types {
    use crate::guid::Guid;

    pub const EfiSystem: Guid = Guid::from_fields(
        0xC12A_7328,
        0xF81F,
        0x11D2,
        [0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E, 0xC9, 0x3B],
    );
    pub const BiosBoot: Guid = Guid::from_fields(
        0x2168_6148,
        0x6449,
        0x6E6F,
        [0x74, 0x4E, 0x65, 0x65, 0x64, 0x45, 0x46, 0x49],
    );
    pub const MicrosoftBasicData: Guid = Guid::from_fields(
        0xEBD0_A0A2,
        0xB9E5,
        0x4433,
        [0x87, 0xC0, 0x68, 0xB6, 0xB7, 0x26, 0x99, 0xC7],
    );
    pub const LinuxFilesystemData: Guid = Guid::from_fields(
        0x0FC6_3DAF,
        0x8483,
        0x4772,
        [0x8E, 0x79, 0x3D, 0x69, 0xD8, 0x47, 0x7D, 0xE4],
    );
    pub const LinuxSwap: Guid = Guid::from_fields(
        0x0657_FD6D,
        0xA4AB,
        0x43C4,
        [0x84, 0xE5, 0x09, 0x33, 0xC8, 0x4B, 0x4F, 0x4F],
    );
}

macro_rules! __to_guid_match {
    ($self:ident, $($i:ident),+) => {
        match $self {
            PartitionType::Unused => Guid::ZERO,
            PartitionType::Unknown => Guid::ZERO,
            $(
            PartitionType::$i => types::$i,
            )+
        }
    };
}

macro_rules! __from_guid_match {
    ($g:ident, $($i:ident),+) => {
        if $g.is_zero() {
            PartitionType::Unused
        }
        $(
        else if $g == types::$i {
            PartitionType::$i
        }
        )+
        else {
            PartitionType::Unknown
        }
    };
}

impl PartitionType {
    /// The type GUID for this partition type.
    ///
    /// [`PartitionType::Unused`] and [`PartitionType::Unknown`] are the zero
    /// GUID, which the layout rejects.
    pub fn to_guid(self) -> Guid {
        __to_guid_match!(
            self,
            EfiSystem,
            BiosBoot,
            MicrosoftBasicData,
            LinuxFilesystemData,
            LinuxSwap
        )
    }

    /// Recognize a type GUID.
    pub fn from_guid(guid: Guid) -> Self {
        __from_guid_match!(
            guid,
            EfiSystem,
            BiosBoot,
            MicrosoftBasicData,
            LinuxFilesystemData,
            LinuxSwap
        )
    }
}

impl From<PartitionType> for Guid {
    fn from(t: PartitionType) -> Self {
        t.to_guid()
    }
}
