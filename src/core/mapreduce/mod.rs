//! Pure MapReduce partitioning functions
//!
//! These functions split work across workers without performing any I/O operations.

use crate::error::PartitionError;
use std::ops::Range;

/// Largest worker count a call accepts; chunk ids are `u32`
pub const MAX_WORKER_COUNT: usize = u32::MAX as usize;

/// Reject worker counts that cannot be numbered with a `u32` chunk id, and zero.
pub fn validate_worker_count(worker_count: usize) -> Result<u32, PartitionError> {
    match u32::try_from(worker_count) {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(PartitionError::InvalidWorkerCount(worker_count)),
    }
}

/// Split `data` into `worker_count` contiguous chunks.
///
/// Every worker but the last receives `data.len() / worker_count` items; the
/// last worker absorbs whatever remains. When there are more workers than
/// items, the leading chunks are empty and the last chunk holds everything.
///
/// The input is consumed and each chunk is an owned vector, so no two chunks
/// can alias the same items.
pub fn partition<T>(data: Vec<T>, worker_count: usize) -> Result<Vec<Vec<T>>, PartitionError> {
    validate_worker_count(worker_count)?;

    let base = data.len() / worker_count;
    let mut remaining = data.into_iter();

    let chunks = (1..=worker_count)
        .map(|worker_index| {
            if worker_index < worker_count {
                remaining.by_ref().take(base).collect()
            } else {
                remaining.by_ref().collect()
            }
        })
        .collect();

    Ok(chunks)
}

/// Index ranges that [`partition`] would produce for `len` items.
pub fn chunk_bounds(len: usize, worker_count: usize) -> Result<Vec<Range<usize>>, PartitionError> {
    validate_worker_count(worker_count)?;

    let base = len / worker_count;
    let mut start = 0;

    Ok((1..=worker_count)
        .map(|worker_index| {
            let end = if worker_index < worker_count {
                start + base
            } else {
                len
            };
            let range = start..end;
            start = end;
            range
        })
        .collect())
}

/// Chunk sizes in worker-index order
pub fn chunk_sizes(len: usize, worker_count: usize) -> Result<Vec<usize>, PartitionError> {
    Ok(chunk_bounds(len, worker_count)?
        .into_iter()
        .map(|range| range.len())
        .collect())
}

/// Number of worker processes one `map_reduce` call starts: one per chunk plus the reducer
pub fn spawned_process_count(worker_count: usize) -> usize {
    worker_count + 1
}
