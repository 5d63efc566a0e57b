//! Type-safe Newtype wrappers
use crate::gpt::error::{Error, Result};
use core::{convert::TryFrom, ops};
use derive_more::*;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// Helper to define Size from_* setters.
macro_rules! __SizeImplFrom {
    ($m:expr, $p:ident, $v:expr) => {
        /// Create a [`Size`] from the specified number of `
        #[doc = $m]
        ///`
        pub const fn $p($p: u64) -> Self {
            Self($p * (1u64 << (10 * $v)))
        }
    };
}

/// Helper to define Size as_* getters.
macro_rules! __SizeImplAs {
    ($m:expr, $p:ident, $v:expr) => {
        /// Return the number of *whole* `
        #[doc = $m]
        ///` contained by this [`Size`].
        pub const fn $p(&self) -> u64 {
            self.0 >> (10 * $v)
        }
    };
}

/// Logical block (sector) size, in bytes.
///
/// Always a multiple of 512, between 512 and 4096 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Into, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", try_from = "u64", into = "u64")
)]
#[repr(transparent)]
pub struct BlockSize(u64);

impl BlockSize {
    /// Smallest supported block size, and the unit all sizes are multiples of.
    pub const MIN: BlockSize = BlockSize(512);

    /// Largest supported block size.
    pub const MAX: BlockSize = BlockSize(4096);

    /// Create a new `BlockSize`.
    ///
    /// # Errors
    ///
    /// - If `val` is not a multiple of 512 in `512..=4096`.
    pub fn new(val: u64) -> Result<Self> {
        if val < Self::MIN.0 || val > Self::MAX.0 || val % Self::MIN.0 != 0 {
            return Err(Error::InvalidBlockSize(val));
        }
        Ok(Self(val))
    }

    /// Get the block size as a `u64`
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Block size as a `usize`, for buffer lengths.
    pub(crate) const fn as_usize(self) -> usize {
        // At most 4096, always fits.
        self.0 as usize
    }

    /// Number of blocks needed to hold `size`, rounded up.
    pub fn blocks_for(self, size: Size) -> u64 {
        let bytes = size.as_bytes();
        bytes / self.0 + u64::from(bytes % self.0 != 0)
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<u64> for BlockSize {
    type Error = Error;

    fn try_from(val: u64) -> Result<Self> {
        Self::new(val)
    }
}

/// Represents a byte offset.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Display, Into, From)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[repr(transparent)]
pub struct Offset(pub u64);

impl Offset {
    /// The byte offset as a `u64`
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Device, Partition, or Payload Size.
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Default,
    Display,
    Into,
    From,
    Add,
    Sub,
    AddAssign,
    SubAssign,
)]
#[display(fmt = "{} Bytes", _0)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[repr(transparent)]
pub struct Size(u64);

impl Size {
    __SizeImplFrom!("Bytes", from_bytes, 0);
    __SizeImplFrom!("KiB", from_kib, 1);
    __SizeImplFrom!("MiB", from_mib, 2);
    //
    __SizeImplAs!("Bytes", as_bytes, 0);
    __SizeImplAs!("KiB", as_kib, 1);
    __SizeImplAs!("MiB", as_mib, 2);
}

/// A [`Size`] from a [`BlockSize`]
impl From<BlockSize> for Size {
    fn from(o: BlockSize) -> Self {
        Self(o.get())
    }
}

/// Device Logical Block Address
///
/// The size of a block is dependent on it's associated [`BlockSize`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, Default, From, Into)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[display(fmt = "Block {}", _0)]
#[repr(transparent)]
pub struct Block(pub u64);

impl Block {
    /// The block address as a `u64`
    pub const fn get(self) -> u64 {
        self.0
    }

    /// `self + rhs`, or [`Error::Overflow`].
    pub fn checked_add(self, rhs: u64) -> Result<Block> {
        self.0.checked_add(rhs).map(Block).ok_or(Error::Overflow)
    }

    /// Byte offset of this block, or [`Error::Overflow`].
    pub fn checked_offset(self, block_size: BlockSize) -> Result<Offset> {
        self.0
            .checked_mul(block_size.get())
            .map(Offset)
            .ok_or(Error::Overflow)
    }
}

/// Byte offset of this block.
///
/// Only used on addresses a [`crate::LayoutPlan`] has already proven fit.
impl ops::Mul<BlockSize> for Block {
    type Output = Offset;

    fn mul(self, rhs: BlockSize) -> Self::Output {
        Offset(self.0 * rhs.get())
    }
}

impl ops::Add<u64> for Block {
    type Output = Block;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl ops::Sub<u64> for Block {
    type Output = Block;

    fn sub(self, rhs: u64) -> Self::Output {
        Self(self.0 - rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_range() {
        for ok in &[512, 1024, 1536, 2048, 4096] {
            assert_eq!(BlockSize::new(*ok).unwrap().get(), *ok);
        }
        for bad in &[0, 256, 511, 513, 1000, 4608, 8192] {
            let err = BlockSize::new(*bad).unwrap_err();
            assert!(matches!(err, Error::InvalidBlockSize(v) if v == *bad));
        }
    }

    #[test]
    fn blocks_for_rounds_up() {
        let bs = BlockSize::MIN;
        assert_eq!(bs.blocks_for(Size::from_bytes(0)), 0);
        assert_eq!(bs.blocks_for(Size::from_bytes(1)), 1);
        assert_eq!(bs.blocks_for(Size::from_bytes(512)), 1);
        assert_eq!(bs.blocks_for(Size::from_bytes(513)), 2);
        assert_eq!(BlockSize::MAX.blocks_for(Size::from_kib(16)), 4);
    }

    #[test]
    fn size_units() {
        assert_eq!(Size::from_kib(16).as_bytes(), 16384);
        assert_eq!(Size::from_mib(1).as_kib(), 1024);
        assert_eq!(Size::from_bytes(1_572_864).as_mib(), 1);
    }

    #[test]
    fn block_overflow() {
        assert!(matches!(
            Block(u64::MAX).checked_add(1),
            Err(Error::Overflow)
        ));
        assert!(matches!(
            Block(u64::MAX / 2).checked_offset(BlockSize::MIN),
            Err(Error::Overflow)
        ));
        assert_eq!(Block(34) * BlockSize::MIN, Offset(34 * 512));
    }
}
