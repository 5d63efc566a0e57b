//! Error handling
use displaydoc::Display;
use thiserror::Error;

/// Broad classification of an [`Error`].
///
/// Nothing here is worth retrying without the caller changing something.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Global sizing parameters or the partition list itself are unusable.
    Configuration,

    /// A partition, or the requested image size, can't be laid out.
    Spec,

    /// A partition payload couldn't be sized or read.
    Resource,

    /// The output image couldn't be written. Discard it.
    Write,

    /// An image read back for verification couldn't be read, or is not a
    /// valid GPT.
    Invalid,
}

/// Error type.
#[derive(Debug, Display, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid block size {0}, must be a multiple of 512 between 512 and 4096
    InvalidBlockSize(u64),

    /// No partitions were specified
    NoPartitions,

    /// Layout was planned for {planned} partitions, but {given} were given
    PlanMismatch {
        /// Partitions in the plan
        planned: usize,
        /// Partitions passed to the writer
        given: usize,
    },

    /// Partition {0} has no partition type
    MissingType(usize),

    /// Partition {0} would be empty
    EmptyPartition(usize),

    /// Partition {index} can't start at block {start}, it would overlap data before block {cursor}
    Overlap {
        /// 1-based partition number
        index: usize,
        /// Requested start
        start: u64,
        /// First free block
        cursor: u64,
    },

    /// Image size of {requested} blocks is too small, the partitions need {needed}
    ImageTooSmall {
        /// Blocks requested by the caller
        requested: u64,
        /// Blocks the layout requires
        needed: u64,
    },

    /// Sector or byte arithmetic overflowed
    Overflow,

    /// Invalid GUID `{0}`
    InvalidGuid(String),

    /// Couldn't read the payload of partition {index}: {source}
    Payload {
        /// 1-based partition number
        index: usize,
        /// Underlying error
        source: std::io::Error,
    },

    /// I/O Error: {0}
    Io(#[from] std::io::Error),

    /// Couldn't read the image back: {0}
    Read(#[source] std::io::Error),

    /// Not enough data was provided
    NotEnough,

    /// The GPT was invalid: {0}
    Invalid(&'static str),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidBlockSize(_) | Error::NoPartitions | Error::PlanMismatch { .. } => {
                ErrorKind::Configuration
            }
            Error::MissingType(_)
            | Error::EmptyPartition(_)
            | Error::Overlap { .. }
            | Error::ImageTooSmall { .. }
            | Error::Overflow
            | Error::InvalidGuid(_) => ErrorKind::Spec,
            Error::Payload { .. } => ErrorKind::Resource,
            Error::Io(_) => ErrorKind::Write,
            Error::Read(_) | Error::NotEnough | Error::Invalid(_) => ErrorKind::Invalid,
        }
    }
}

/// Result type, defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
