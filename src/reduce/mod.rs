//! Data-parallel extremum reductions.
//!
//! Both reducers run a first pass that reduces every work-group to its winning indices, then
//! combine passes over those candidates until a single group is left.

mod bbox;
mod minmax;

pub use bbox::{BoundingBoxReducer, Extrema};
pub use minmax::{MinMaxIndices, MinMaxReducer};

use log::{debug, warn};

use crate::error::{MortonSortError, Result};
use crate::surface::{BufferHandle, Dispatch, ExecutionSurface, Kernel, Scalar};
use crate::util::{check_reduction_len, effective_group_size};

/// The kernels and candidate width of one reduction shape.
struct Reduction {
    first: Kernel,
    combine: Kernel,
    /// Candidate indices written per group.
    width: usize,
}

/// Queue every pass of `reduction` over `len` elements of `data`, wait, and return the final
/// candidate indices, each checked to address one of the `len` elements.
fn run_reduction<S: ExecutionSurface>(
    surface: &mut S,
    reduction: Reduction,
    data: BufferHandle,
    len: usize,
    group_size: usize,
) -> Result<Vec<usize>> {
    check_reduction_len(len)?;
    let max_group_size = surface.max_group_size();
    if len > 1 && max_group_size < 2 {
        return Err(MortonSortError::InvalidSize {
            parameter: "max_group_size",
            value: max_group_size,
            reason: "reducing more than one element needs groups of at least 2 lanes",
        });
    }

    let mut temporaries = vec![];
    let result = match queue_passes(surface, &reduction, data, len, group_size, &mut temporaries)
    {
        Ok(candidates) => surface
            .await_completion()
            .and_then(|_| surface.download_vec::<i32>(candidates)),
        Err(err) => {
            // drain the passes queued before the failure so they run before their buffers are released
            if let Err(flush) = surface.await_completion() {
                debug!("Draining the reduction queue failed: {}", flush);
            }
            Err(err)
        }
    };

    for buffer in temporaries {
        if let Err(err) = surface.release(buffer) {
            warn!("Failed to release reduction buffer {}: {}", buffer.id(), err);
        }
    }

    let candidates = result?;
    candidates
        .into_iter()
        .take(reduction.width)
        .map(|index| match usize::try_from(index) {
            Ok(index) if index < len => Ok(index),
            _ => Err(MortonSortError::IndexOutOfRange {
                index: index.into(),
                len,
            }),
        })
        .collect()
}

fn queue_passes<S: ExecutionSurface>(
    surface: &mut S,
    reduction: &Reduction,
    data: BufferHandle,
    len: usize,
    group_size: usize,
    temporaries: &mut Vec<BufferHandle>,
) -> Result<BufferHandle> {
    let group = effective_group_size(group_size, surface.max_group_size(), len);
    let mut num_groups = len.div_ceil(group);
    let mut candidates = surface.allocate(num_groups * reduction.width * 4)?;
    temporaries.push(candidates);

    debug!(
        "Reducing {} elements with {} in {} groups of {}",
        len, reduction.first, num_groups, group
    );
    surface.dispatch(
        Dispatch::new(reduction.first, num_groups * group, group)
            .buffer(data)
            .buffer(candidates)
            .scalar(Scalar::U32(len as u32)),
    )?;

    while num_groups > 1 {
        let count = num_groups;
        // a combine pass must at least halve the candidates
        let group = effective_group_size(group_size, surface.max_group_size(), count).max(2);
        num_groups = count.div_ceil(group);
        let combined = surface.allocate(num_groups * reduction.width * 4)?;
        temporaries.push(combined);

        debug!(
            "Combining {} candidates with {} in {} groups of {}",
            count, reduction.combine, num_groups, group
        );
        surface.dispatch(
            Dispatch::new(reduction.combine, num_groups * group, group)
                .buffer(data)
                .buffer(candidates)
                .buffer(combined)
                .scalar(Scalar::U32(count as u32)),
        )?;
        candidates = combined;
    }

    Ok(candidates)
}
