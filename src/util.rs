//! Size checks shared by the reducers, the encoder and the sorter.

use crate::error::{MortonSortError, Result};

/// The default number of lanes per work-group.
///
/// This matches the SIMD width of most GPUs, so a group is a single hardware wave.
pub const DEFAULT_GROUP_SIZE: usize = 32;

/// Reject group sizes that cannot drive a binary tree reduction.
pub(crate) fn validate_group_size(group_size: usize) -> Result<()> {
    if group_size == 0 || !group_size.is_power_of_two() {
        return Err(MortonSortError::InvalidSize {
            parameter: "group_size",
            value: group_size,
            reason: "must be a non-zero power of two",
        });
    }
    Ok(())
}

/// The group size actually dispatched over `len` elements.
///
/// Small inputs shrink the group to the next power of two above `len`, so that a single group
/// never carries more padding lanes than real ones.
pub(crate) fn effective_group_size(configured: usize, surface_max: usize, len: usize) -> usize {
    let limit = configured.min(surface_max.max(1));
    // largest power of two not above the limit
    let limit = 1usize << (usize::BITS - 1 - limit.leading_zeros());
    limit.min(len.max(1).next_power_of_two())
}

/// Reject empty inputs and inputs whose indices do not fit the `i32` index buffers.
pub(crate) fn check_reduction_len(len: usize) -> Result<()> {
    if len == 0 {
        return Err(MortonSortError::InvalidSize {
            parameter: "len",
            value: len,
            reason: "cannot reduce an empty array",
        });
    }
    if len > i32::MAX as usize {
        return Err(MortonSortError::InvalidSize {
            parameter: "len",
            value: len,
            reason: "indices must fit in a 32-bit signed integer",
        });
    }
    Ok(())
}

/// The bitonic network only exists for power-of-two lengths.
pub(crate) fn check_sort_len(len: usize) -> Result<()> {
    if len == 0 || !len.is_power_of_two() {
        return Err(MortonSortError::InvalidSize {
            parameter: "len",
            value: len,
            reason: "must be a non-zero power of two",
        });
    }
    Ok(())
}
