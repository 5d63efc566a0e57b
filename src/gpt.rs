//! GPT image building
//!
//! Planning happens in [`layout`], serialization in [`image`], and
//! [`verify`] reads the result back.
pub mod error;
pub mod header;
pub mod image;
pub mod layout;
pub mod partition;
pub mod verify;
