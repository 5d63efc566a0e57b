//! Writing images
use super::{
    error::*,
    header::{Header, HEADER_SIZE, PARTITION_ENTRY_SIZE},
    layout::{ImageConfig, LayoutPlan},
    partition::{calculate_part_crc, PartitionSpec},
};
use crate::{guid::fork_process_rng, mbr::ProtectiveMbr, types::*};
use core::convert::TryFrom;
use log::{debug, trace};
use std::io::{self, prelude::*, SeekFrom};

/// Copy exactly `blocks` blocks from `source` to `dest`.
///
/// Short sources are padded with zeros, long ones are cut off.
fn copy_payload<S: Read, W: Write>(
    index: usize,
    source: &mut S,
    dest: &mut W,
    blocks: u64,
    block_size: BlockSize,
) -> Result<()> {
    let mut buf = vec![0; block_size.as_usize()];
    let mut eof = false;
    for _ in 0..blocks {
        let mut filled = 0;
        while !eof && filled < buf.len() {
            match source.read(&mut buf[filled..]) {
                Ok(0) => eof = true,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(source) => return Err(Error::Payload { index, source }),
            }
        }
        for b in &mut buf[filled..] {
            *b = 0;
        }
        dest.write_all(&buf)?;
    }
    Ok(())
}

/// Write `blocks` zeroed blocks to `dest`.
fn zero_fill<W: Write>(dest: &mut W, blocks: u64, block_size: BlockSize) -> Result<()> {
    let zeros = vec![0; block_size.as_usize()];
    for _ in 0..blocks {
        dest.write_all(&zeros)?;
    }
    Ok(())
}

/// Write the image described by `plan` to `dest`.
///
/// `specs` must be the partitions `plan` was built from, in the same order.
/// Only their payloads are used.
///
/// Every byte of the image is written, regions the plan leaves unused as
/// zeros, so `dest` may hold stale data. Anything in `dest` past the end of
/// the image is left alone.
///
/// # Details
///
/// This writes, in order:
///
/// - The Protective MBR
/// - The primary header
/// - The primary partition array
/// - Every partition's payload, with zeros before and after it
/// - The backup partition array
/// - The backup header
///
/// # Errors
///
/// Any error leaves `dest` partially written. Discard it.
pub fn write_image<S, W>(plan: &LayoutPlan, specs: &mut [PartitionSpec<S>], mut dest: W) -> Result<()>
where
    S: Read + Seek,
    W: Write + Seek,
{
    if specs.len() != plan.partitions().len() {
        return Err(Error::PlanMismatch {
            planned: plan.partitions().len(),
            given: specs.len(),
        });
    }
    let block_size = plan.block_size();

    // Partition array, shared by both headers
    let array_len = plan
        .header_blocks()
        .checked_mul(block_size.get())
        .and_then(|len| usize::try_from(len).ok())
        .ok_or(Error::Overflow)?;
    let mut array = vec![0; array_len];
    for (part, entry) in plan
        .partitions()
        .iter()
        .zip(array.chunks_mut(PARTITION_ENTRY_SIZE as usize))
    {
        part.entry().to_bytes(entry);
    }
    let parts_crc = calculate_part_crc(&array, plan.partitions().len());

    let primary = Header::primary(plan, parts_crc);
    let alt = primary.mirrored(plan.alt_array());
    let mut primary_buf = vec![0; block_size.as_usize()];
    primary.to_bytes(&mut primary_buf[..HEADER_SIZE as usize])?;
    let mut alt_buf = vec![0; block_size.as_usize()];
    alt.to_bytes(&mut alt_buf[..HEADER_SIZE as usize])?;

    let mut mbr_buf = vec![0; block_size.as_usize()];
    ProtectiveMbr::new(plan.alt_header()).write_bytes(&mut mbr_buf, block_size)?;

    trace!("Writing protective MBR, primary header and array");
    dest.seek(SeekFrom::Start(0))?;
    dest.write_all(&mbr_buf)?;
    dest.write_all(&primary_buf)?;
    dest.write_all(&array)?;

    // Partitions are in ascending order, so everything after is written forwards
    let mut cursor = plan.first_usable();
    for (i, (part, spec)) in plan.partitions().iter().zip(specs.iter_mut()).enumerate() {
        let index = i + 1;
        trace!(
            "Writing partition {} to {}, {} blocks",
            index,
            part.start,
            part.length
        );
        spec.payload
            .seek(SeekFrom::Start(0))
            .map_err(|source| Error::Payload { index, source })?;
        zero_fill(&mut dest, part.start.0 - cursor.0, block_size)?;
        copy_payload(index, &mut spec.payload, &mut dest, part.length, block_size)?;
        cursor = part.start + part.length;
    }
    zero_fill(&mut dest, plan.alt_array().0 - cursor.0, block_size)?;

    trace!("Writing backup array to {}", plan.alt_array());
    dest.write_all(&array)?;
    trace!("Writing backup header to {}", plan.alt_header());
    dest.write_all(&alt_buf)?;
    dest.flush()?;

    debug!(
        "Wrote {} image with {} partitions",
        plan.image_size(),
        plan.partitions().len()
    );
    Ok(())
}

/// Plan and write an image in one go.
///
/// Random GUIDs come from a generator seeded from the process-wide source,
/// so payloads are free to generate GUIDs of their own. Nothing is written
/// to `dest` if planning fails.
pub fn build_image<S, W>(
    specs: &mut [PartitionSpec<S>],
    config: &ImageConfig,
    dest: W,
) -> Result<LayoutPlan>
where
    S: Read + Seek,
    W: Write + Seek,
{
    let plan = LayoutPlan::new(specs, config, &mut fork_process_rng())?;
    write_image(&plan, specs, dest)?;
    Ok(plan)
}
