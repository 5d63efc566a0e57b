//! A Pure Rust library for building GPT disk images.
//!
//! Describe each partition with a [`PartitionSpec`], then either plan the
//! layout with [`LayoutPlan::new`] and write it with [`write_image`], or do
//! both at once with [`build_image`].
//!
//! # Usage
//!
//! Build an image with an EFI System Partition and a Linux root
//!
//! ```rust
//! # use gptimg::{build_image, verify_image, ImageConfig, PartitionSpec, PartitionType};
//! # use std::io::Cursor;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let esp = Cursor::new(vec![0xAA; 4096]);
//! let root = Cursor::new(vec![0xBB; 8192]);
//! let mut specs = [
//!     PartitionSpec::new(PartitionType::EfiSystem, esp).name("EFI"),
//!     PartitionSpec::new(PartitionType::LinuxFilesystemData, root).name("root"),
//! ];
//! let mut image = Cursor::new(Vec::new());
//! let plan = build_image(&mut specs, &ImageConfig::default(), &mut image)?;
//! for part in plan.partitions() {
//!     println!("{}: {} to {}", part.guid, part.start, part.end());
//! }
//!
//! let verified = verify_image(Cursor::new(image.into_inner()), plan.block_size())?;
//! assert_eq!(verified.disk_guid, plan.disk_guid());
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]

#[cfg(test)]
mod util;

pub mod checksum;
mod gpt;
pub mod guid;
pub mod mbr;
mod partitions;
pub mod types;

pub use gpt::{
    error::{Error, ErrorKind, Result},
    header::{Header, HEADER_SIZE, PARTITION_ENTRY_SIZE},
    image::{build_image, write_image},
    layout::{ImageConfig, LayoutPlan, PlannedPartition, DEFAULT_MIN_IMAGE_BLOCKS},
    partition::{PartitionEntry, PartitionSpec, Name, MIN_PARTITIONS_BYTES, PARTITION_NAME_LEN},
    verify::{verify_image, VerifiedImage},
};
pub use guid::Guid;
pub use partitions::*;

// Re-exports
pub use arrayvec;
pub use uuid;
