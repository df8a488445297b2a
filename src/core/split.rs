//! Division of oversized requests into block-sized sibling requests.

use thiserror::Error;

use crate::core::common::JobId;
use crate::core::request::StorageRequest;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("re-splitting would produce {part_gb} GB parts, below the {min_gb} GB minimum block size")]
    BelowMinBlockSize { part_gb: f64, min_gb: f64 },
}

/// Divides a request whose capacity exceeds `block_size_gb` into sibling requests.
///
/// A request within the block size is returned unchanged as its own single sibling.
/// A first-time split produces full-block siblings plus one remainder sibling; every
/// sibling keeps the original duration and start time and carries its split index and
/// the sibling count on its job id. A request that is already a sibling of an earlier
/// split is re-split evenly into as many parts, under the old sibling's id as the new
/// logical id; the operation is refused if the resulting per-part capacity would fall
/// below `min_block_size_gb`.
pub fn split_request(
    request: &StorageRequest,
    block_size_gb: f64,
    min_block_size_gb: f64,
) -> Result<Vec<StorageRequest>, SplitError> {
    if request.capacity <= block_size_gb {
        return Ok(vec![request.clone()]);
    }

    if request.divided() > 1 {
        let count = request.divided();
        let part_capacity = request.capacity / count as f64;
        if part_capacity < min_block_size_gb {
            return Err(SplitError::BelowMinBlockSize {
                part_gb: part_capacity,
                min_gb: min_block_size_gb,
            });
        }
        let logical = request.job_id.to_string();
        let parts = (0..count)
            .map(|split_index| {
                let mut part = request.clone();
                part.capacity = part_capacity;
                part.job_id = JobId::part(&logical, split_index, count);
                part
            })
            .collect();
        return Ok(parts);
    }

    let full_parts = (request.capacity / block_size_gb).floor() as u32;
    let remainder = request.capacity - full_parts as f64 * block_size_gb;
    let count = full_parts + (remainder > 0.) as u32;
    let mut parts = Vec::with_capacity(count as usize);
    for split_index in 0..full_parts {
        let mut part = request.clone();
        part.capacity = block_size_gb;
        part.job_id = JobId::part(&request.job_id.logical, split_index, count);
        parts.push(part);
    }
    if remainder > 0. {
        let mut part = request.clone();
        part.capacity = remainder;
        part.job_id = JobId::part(&request.job_id.logical, full_parts, count);
        parts.push(part);
    }
    Ok(parts)
}
