use std::collections::HashMap;

use bytemuck::Pod;
use log::{debug, warn};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::{MortonSortError, Result};
use crate::kernel;
use crate::point::Point;
use crate::r#type::{DeviceNum, NumericType};
use crate::surface::dispatch::{BufferHandle, Dispatch, Kernel};
use crate::surface::r#trait::ExecutionSurface;
use crate::surface::workgroup::WorkGroup;

/// Instantiate a generic kernel runner for the dispatch's scalar type.
macro_rules! by_numeric_type {
    ($numeric:expr, $runner:ident ( $($arg:expr),* )) => {
        match $numeric {
            NumericType::Int32 => $runner::<i32>($($arg),*),
            NumericType::UInt32 => $runner::<u32>($($arg),*),
            NumericType::Float32 => $runner::<f32>($($arg),*),
        }
    };
}

/// The default upper bound on lanes per work-group.
pub const DEFAULT_MAX_GROUP_SIZE: usize = 1024;

/// An [`ExecutionSurface`] that runs every kernel on the host CPU.
///
/// Buffers are stored as 32-bit words. Dispatches are queued by [`ExecutionSurface::dispatch`] and
/// executed in submission order by [`ExecutionSurface::await_completion`]. With the `rayon` feature
/// the work-groups of one dispatch run on the rayon thread pool.
///
/// ```
/// use morton_sort::surface::{ExecutionSurface, HostSurface};
/// use morton_sort::BitonicSorter;
///
/// let mut surface = HostSurface::new();
/// let mut values = vec![7, 3, 5, 1, 6, 0, 4, 2];
/// BitonicSorter::default()
///     .sort_slice(&mut surface, &mut values)
///     .unwrap();
/// assert_eq!(values, vec![0, 1, 2, 3, 4, 5, 6, 7]);
/// ```
#[derive(Debug)]
pub struct HostSurface {
    buffers: HashMap<BufferHandle, Vec<u32>>,
    queue: Vec<Dispatch>,
    next_id: u64,
    max_group_size: usize,
    completed_dispatches: usize,
}

impl HostSurface {
    /// Create a new surface with the default maximum group size.
    pub fn new() -> Self {
        Self::new_with_max_group_size(DEFAULT_MAX_GROUP_SIZE)
    }

    /// Create a new surface accepting groups of at most `max_group_size` lanes.
    pub fn new_with_max_group_size(max_group_size: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            queue: vec![],
            next_id: 1,
            max_group_size,
            completed_dispatches: 0,
        }
    }

    /// The number of dispatches executed so far.
    pub fn completed_dispatches(&self) -> usize {
        self.completed_dispatches
    }

    /// The number of dispatches waiting for [`ExecutionSurface::await_completion`].
    pub fn pending_dispatches(&self) -> usize {
        self.queue.len()
    }

    /// The number of buffers currently allocated.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn insert(&mut self, words: Vec<u32>) -> BufferHandle {
        let handle = BufferHandle::new(self.next_id);
        self.next_id += 1;
        self.buffers.insert(handle, words);
        handle
    }

    fn words(&self, buffer: BufferHandle) -> Result<&[u32]> {
        self.buffers
            .get(&buffer)
            .map(Vec::as_slice)
            .ok_or_else(|| unknown_buffer(buffer))
    }

    /// Detach `buffer` for mutable use by `f`, then put it back.
    ///
    /// While detached, the buffer cannot be bound a second time.
    fn with_output(
        &mut self,
        buffer: BufferHandle,
        f: impl FnOnce(&mut Self, &mut [u32]) -> Result<()>,
    ) -> Result<()> {
        let mut words = self
            .buffers
            .remove(&buffer)
            .ok_or_else(|| unknown_buffer(buffer))?;
        let result = f(self, words.as_mut_slice());
        self.buffers.insert(buffer, words);
        result
    }

    fn validate(&self, dispatch: &Dispatch) -> Result<()> {
        let group_size = dispatch.group_size;
        if group_size == 0 || !group_size.is_power_of_two() || group_size > self.max_group_size {
            return Err(device_failure(format!(
                "{}: group size {} must be a power of two no larger than {}",
                dispatch.kernel, group_size, self.max_group_size
            )));
        }
        if dispatch.grid_size == 0 || dispatch.grid_size % group_size != 0 {
            return Err(device_failure(format!(
                "{}: grid size {} is not a non-zero multiple of group size {}",
                dispatch.kernel, dispatch.grid_size, group_size
            )));
        }
        for buffer in dispatch.buffers.iter() {
            if !self.buffers.contains_key(buffer) {
                return Err(unknown_buffer(*buffer));
            }
        }

        let required = dispatch.kernel.local_memory(group_size);
        let enough = required.len() == dispatch.local_mem_sizes.len()
            && required
                .iter()
                .zip(dispatch.local_mem_sizes.iter())
                .all(|(need, have)| have >= need);
        if !enough {
            return Err(device_failure(format!(
                "{}: local memory {:?} does not cover {:?}",
                dispatch.kernel, dispatch.local_mem_sizes, required
            )));
        }
        Ok(())
    }

    fn execute(&mut self, dispatch: &Dispatch) -> Result<()> {
        debug!(
            "Executing {} over {} lanes in {} groups",
            dispatch.kernel,
            dispatch.grid_size,
            dispatch.num_groups()
        );
        match dispatch.kernel {
            Kernel::MinMax(t) => by_numeric_type!(t, run_min_max(self, dispatch)),
            Kernel::MinMaxCombine(t) => by_numeric_type!(t, run_min_max_combine(self, dispatch)),
            Kernel::BoundingBox(t) => by_numeric_type!(t, run_bounding_box(self, dispatch)),
            Kernel::BoundingBoxCombine(t) => {
                by_numeric_type!(t, run_bounding_box_combine(self, dispatch))
            }
            Kernel::Morton(t) => by_numeric_type!(t, run_morton(self, dispatch)),
            Kernel::Bitonic(t) => by_numeric_type!(t, run_bitonic(self, dispatch)),
            Kernel::KeyValueBitonic { key, value_words } => {
                by_numeric_type!(key, run_key_value_bitonic(self, dispatch, value_words as usize))
            }
        }
    }
}

impl Default for HostSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSurface for HostSurface {
    fn upload(&mut self, bytes: &[u8]) -> Result<BufferHandle> {
        if bytes.len() % 4 != 0 {
            return Err(device_failure(format!(
                "cannot upload {} bytes, buffers hold whole 32-bit words",
                bytes.len()
            )));
        }
        let mut words = vec![0u32; bytes.len() / 4];
        bytemuck::cast_slice_mut::<u32, u8>(&mut words).copy_from_slice(bytes);
        let handle = self.insert(words);
        debug!("Uploaded {} bytes to buffer {}", bytes.len(), handle.id());
        Ok(handle)
    }

    fn allocate(&mut self, byte_length: usize) -> Result<BufferHandle> {
        if byte_length % 4 != 0 {
            return Err(device_failure(format!(
                "cannot allocate {} bytes, buffers hold whole 32-bit words",
                byte_length
            )));
        }
        Ok(self.insert(vec![0; byte_length / 4]))
    }

    fn download(&mut self, buffer: BufferHandle) -> Result<Vec<u8>> {
        if self.queue.iter().any(|dispatch| dispatch.binds(buffer)) {
            return Err(device_failure(format!(
                "buffer {} is bound to a pending dispatch",
                buffer.id()
            )));
        }
        let words = self.words(buffer)?;
        debug!("Downloading {} bytes from buffer {}", words.len() * 4, buffer.id());
        Ok(bytemuck::cast_slice(words).to_vec())
    }

    fn release(&mut self, buffer: BufferHandle) -> Result<()> {
        self.buffers
            .remove(&buffer)
            .map(|_| ())
            .ok_or_else(|| unknown_buffer(buffer))
    }

    fn dispatch(&mut self, dispatch: Dispatch) -> Result<()> {
        self.validate(&dispatch)?;
        self.queue.push(dispatch);
        Ok(())
    }

    fn await_completion(&mut self) -> Result<()> {
        let queue = std::mem::take(&mut self.queue);
        let total = queue.len();
        for (i, dispatch) in queue.iter().enumerate() {
            if let Err(err) = self.execute(dispatch) {
                warn!(
                    "Dispatch {} of {} ({}) failed, discarding the rest: {}",
                    i + 1,
                    total,
                    dispatch.kernel,
                    err
                );
                return Err(err);
            }
            self.completed_dispatches += 1;
        }
        debug!("Completed {} dispatches", total);
        Ok(())
    }

    fn max_group_size(&self) -> usize {
        self.max_group_size
    }
}

fn device_failure(message: String) -> MortonSortError {
    MortonSortError::DeviceFailure(message)
}

fn unknown_buffer(buffer: BufferHandle) -> MortonSortError {
    device_failure(format!("buffer {} is unknown or bound twice", buffer.id()))
}

fn view<T: Pod>(words: &[u32]) -> Result<&[T]> {
    bytemuck::try_cast_slice(words).map_err(|err| device_failure(format!("{:?}", err)))
}

fn view_mut<T: Pod>(words: &mut [u32]) -> Result<&mut [T]> {
    bytemuck::try_cast_slice_mut(words).map_err(|err| device_failure(format!("{:?}", err)))
}

/// The first `len` elements of `data`, or a failure naming the binding.
fn prefix<'a, T>(data: &'a [T], len: usize, what: &str) -> Result<&'a [T]> {
    data.get(..len).ok_or_else(|| {
        device_failure(format!(
            "{} buffer holds {} elements, {} required",
            what,
            data.len(),
            len
        ))
    })
}

fn prefix_mut<'a, T>(data: &'a mut [T], len: usize, what: &str) -> Result<&'a mut [T]> {
    let available = data.len();
    data.get_mut(..len).ok_or_else(|| {
        device_failure(format!(
            "{} buffer holds {} elements, {} required",
            what, available, len
        ))
    })
}

/// Run `body` once per work-group, handing each group its slice of `out`.
fn for_each_group(
    dispatch: &Dispatch,
    out: &mut [i32],
    out_per_group: usize,
    body: impl Fn(&mut WorkGroup, &mut [i32]) + Send + Sync,
) {
    let run = |(id, out): (usize, &mut [i32])| {
        let mut group = WorkGroup::new(id, dispatch.group_size, &dispatch.local_mem_sizes);
        body(&mut group, out)
    };

    #[cfg(feature = "rayon")]
    out.par_chunks_mut(out_per_group).enumerate().for_each(run);

    #[cfg(not(feature = "rayon"))]
    out.chunks_mut(out_per_group).enumerate().for_each(run);
}

fn run_min_max<N: DeviceNum>(surface: &mut HostSurface, dispatch: &Dispatch) -> Result<()> {
    let [values, candidates] = dispatch.bindings()?;
    let len = dispatch.scalar_u32(0)? as usize;
    surface.with_output(candidates, |surface, out| {
        let values = prefix(view::<N>(surface.words(values)?)?, len, "values")?;
        let out = prefix_mut(view_mut::<i32>(out)?, dispatch.num_groups() * 2, "candidates")?;
        for_each_group(dispatch, out, 2, |group, out| {
            kernel::min_max(group, values, len, out)
        });
        Ok(())
    })
}

fn run_min_max_combine<N: DeviceNum>(surface: &mut HostSurface, dispatch: &Dispatch) -> Result<()> {
    let [values, candidates_in, candidates_out] = dispatch.bindings()?;
    let count = dispatch.scalar_u32(0)? as usize;
    surface.with_output(candidates_out, |surface, out| {
        let values = view::<N>(surface.words(values)?)?;
        let candidates = prefix(view::<i32>(surface.words(candidates_in)?)?, count * 2, "candidates")?;
        let out = prefix_mut(view_mut::<i32>(out)?, dispatch.num_groups() * 2, "candidates")?;
        for_each_group(dispatch, out, 2, |group, out| {
            kernel::min_max_combine(group, values, candidates, count, out)
        });
        Ok(())
    })
}

fn run_bounding_box<N: DeviceNum>(surface: &mut HostSurface, dispatch: &Dispatch) -> Result<()> {
    let [points, candidates] = dispatch.bindings()?;
    let len = dispatch.scalar_u32(0)? as usize;
    surface.with_output(candidates, |surface, out| {
        let points = prefix(view::<Point<N>>(surface.words(points)?)?, len, "points")?;
        let out = prefix_mut(view_mut::<i32>(out)?, dispatch.num_groups() * 4, "candidates")?;
        for_each_group(dispatch, out, 4, |group, out| {
            kernel::bounding_box(group, points, len, out)
        });
        Ok(())
    })
}

fn run_bounding_box_combine<N: DeviceNum>(
    surface: &mut HostSurface,
    dispatch: &Dispatch,
) -> Result<()> {
    let [points, candidates_in, candidates_out] = dispatch.bindings()?;
    let count = dispatch.scalar_u32(0)? as usize;
    surface.with_output(candidates_out, |surface, out| {
        let points = view::<Point<N>>(surface.words(points)?)?;
        let candidates = prefix(view::<i32>(surface.words(candidates_in)?)?, count * 4, "candidates")?;
        let out = prefix_mut(view_mut::<i32>(out)?, dispatch.num_groups() * 4, "candidates")?;
        for_each_group(dispatch, out, 4, |group, out| {
            kernel::bounding_box_combine(group, points, candidates, count, out)
        });
        Ok(())
    })
}

fn run_morton<N: DeviceNum>(surface: &mut HostSurface, dispatch: &Dispatch) -> Result<()> {
    let [points, keys] = dispatch.bindings()?;
    let min = dispatch.scalar_f64(0)?;
    let max = dispatch.scalar_f64(1)?;
    let len = dispatch.scalar_u32(2)? as usize;
    surface.with_output(keys, |surface, keys| {
        let points = prefix(view::<Point<N>>(surface.words(points)?)?, len, "points")?;
        let keys = prefix_mut(keys, len, "keys")?;
        kernel::morton(points, keys, min, max, dispatch.group_size);
        Ok(())
    })
}

/// Read and check the `(stage, pass)` scalars of a bitonic dispatch over `len` elements.
fn bitonic_step(dispatch: &Dispatch, len: usize) -> Result<(u32, u32)> {
    let stage = dispatch.scalar_u32(0)?;
    let pass = dispatch.scalar_u32(1)?;
    if !len.is_power_of_two() || stage >= len.trailing_zeros() || pass > stage {
        return Err(device_failure(format!(
            "{}: invalid stage {} pass {} over {} elements",
            dispatch.kernel, stage, pass, len
        )));
    }
    Ok((stage, pass))
}

fn run_bitonic<N: DeviceNum>(surface: &mut HostSurface, dispatch: &Dispatch) -> Result<()> {
    let [values] = dispatch.bindings()?;
    let len = dispatch.grid_size;
    let (stage, pass) = bitonic_step(dispatch, len)?;
    surface.with_output(values, |_, words| {
        let values = prefix_mut(view_mut::<N>(words)?, len, "values")?;
        kernel::bitonic_pass(values, stage, pass);
        Ok(())
    })
}

fn run_key_value_bitonic<K: DeviceNum>(
    surface: &mut HostSurface,
    dispatch: &Dispatch,
    value_words: usize,
) -> Result<()> {
    let [keys, values] = dispatch.bindings()?;
    let len = dispatch.grid_size;
    let (stage, pass) = bitonic_step(dispatch, len)?;
    if value_words == 0 {
        return Err(device_failure(format!(
            "{}: values must be at least one word wide",
            dispatch.kernel
        )));
    }
    surface.with_output(keys, |surface, key_words| {
        surface.with_output(values, |_, value_words_buf| {
            let keys = prefix_mut(view_mut::<K>(key_words)?, len, "keys")?;
            let values = prefix_mut(value_words_buf, len * value_words, "values")?;
            kernel::key_value_bitonic_pass(keys, values, value_words, stage, pass);
            Ok(())
        })
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::surface::Scalar;

    #[test]
    fn round_trips_typed_buffers() {
        let mut surface = HostSurface::new();
        let points = vec![Point::new(1.5f32, -2.0), Point::new(0.0, 8.0)];
        let handle = surface.upload_slice(&points).unwrap();
        assert_eq!(surface.download_vec::<Point<f32>>(handle).unwrap(), points);
        assert_eq!(
            surface.download_vec::<f32>(handle).unwrap(),
            vec![1.5, -2.0, 0.0, 8.0]
        );
        surface.release(handle).unwrap();
        assert_eq!(surface.live_buffers(), 0);
        assert!(surface.download(handle).is_err());
    }

    #[test]
    fn rejects_partial_words() {
        let mut surface = HostSurface::new();
        assert!(surface.upload(&[1, 2, 3]).is_err());
        assert!(surface.allocate(6).is_err());
    }

    #[test]
    fn download_waits_for_completion() {
        let mut surface = HostSurface::new();
        let values = surface.upload_slice(&[2i32, 1]).unwrap();
        let dispatch = Dispatch::new(Kernel::Bitonic(NumericType::Int32), 2, 2)
            .buffer(values)
            .scalar(Scalar::U32(0))
            .scalar(Scalar::U32(0));
        surface.dispatch(dispatch).unwrap();
        assert_eq!(surface.pending_dispatches(), 1);
        assert!(surface.download(values).is_err());

        surface.await_completion().unwrap();
        assert_eq!(surface.completed_dispatches(), 1);
        assert_eq!(surface.download_vec::<i32>(values).unwrap(), vec![1, 2]);
    }

    #[test]
    fn rejects_malformed_dispatches() {
        let mut surface = HostSurface::new_with_max_group_size(64);
        let values = surface.upload_slice(&[0u32; 128]).unwrap();
        let kernel = Kernel::Bitonic(NumericType::UInt32);

        // group larger than the surface allows
        assert!(surface
            .dispatch(Dispatch::new(kernel, 128, 128).buffer(values))
            .is_err());
        // grid not a multiple of the group
        assert!(surface
            .dispatch(Dispatch::new(kernel, 96, 64).buffer(values))
            .is_err());
        // missing local memory
        let mut dispatch = Dispatch::new(Kernel::MinMax(NumericType::UInt32), 64, 64);
        dispatch.local_mem_sizes.clear();
        assert!(surface.dispatch(dispatch.buffer(values).buffer(values)).is_err());
        assert_eq!(surface.pending_dispatches(), 0);
    }

    #[test]
    fn failure_discards_queued_dispatches() {
        let mut surface = HostSurface::new();
        let values = surface.upload_slice(&[4i32, 3, 2, 1]).unwrap();
        let pass = |stage, pass| {
            Dispatch::new(Kernel::Bitonic(NumericType::Int32), 4, 4)
                .buffer(values)
                .scalar(Scalar::U32(stage))
                .scalar(Scalar::U32(pass))
        };
        surface.dispatch(pass(0, 0)).unwrap();
        // pass greater than stage only fails once executed
        surface.dispatch(pass(0, 1)).unwrap();
        surface.dispatch(pass(1, 0)).unwrap();

        assert!(surface.await_completion().is_err());
        assert_eq!(surface.completed_dispatches(), 1);
        assert_eq!(surface.pending_dispatches(), 0);
        assert_eq!(surface.download_vec::<i32>(values).unwrap(), vec![3, 4, 2, 1]);
    }

    #[test]
    fn buffer_bound_twice_fails() {
        let mut surface = HostSurface::new();
        let keys = surface.upload_slice(&[1u32, 0]).unwrap();
        let dispatch = Dispatch::new(
            Kernel::KeyValueBitonic {
                key: NumericType::UInt32,
                value_words: 1,
            },
            2,
            2,
        )
        .buffer(keys)
        .buffer(keys)
        .scalar(Scalar::U32(0))
        .scalar(Scalar::U32(0));
        surface.dispatch(dispatch).unwrap();
        assert!(surface.await_completion().is_err());
        // the buffer survives the failed dispatch
        assert_eq!(surface.download_vec::<u32>(keys).unwrap(), vec![1, 0]);
    }
}
