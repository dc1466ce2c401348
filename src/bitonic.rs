//! Bitonic sorting network.

use bytemuck::Pod;
use log::{debug, trace};

use crate::error::{MortonSortError, Result};
use crate::r#type::DeviceNum;
use crate::surface::{BufferHandle, Dispatch, ExecutionSurface, Kernel, Scalar};
use crate::util::{check_sort_len, effective_group_size, validate_group_size, DEFAULT_GROUP_SIZE};

/// The number of compare-exchange passes needed to sort `len` elements, `len` a power of two.
pub fn pass_count(len: usize) -> usize {
    let stages = len.max(1).trailing_zeros() as usize;
    stages * (stages + 1) / 2
}

/// Sorts power-of-two arrays ascending with a bitonic network, one dispatch per pass.
///
/// The sort is not stable: equal keys may come out in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitonicSorter {
    group_size: usize,
}

impl BitonicSorter {
    /// Create a sorter dispatching groups of `group_size` lanes.
    pub fn new(group_size: usize) -> Result<Self> {
        validate_group_size(group_size)?;
        Ok(Self { group_size })
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Queue the passes sorting the first `len` values of type `T` in `values`, in place.
    ///
    /// This does not wait for completion.
    pub fn sort<T: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        values: BufferHandle,
        len: usize,
    ) -> Result<()> {
        self.queue_passes(surface, Kernel::Bitonic(T::NUMERIC_TYPE), &[values], len)
    }

    /// Queue the passes sorting `len` keys of type `K` in place, moving the `value_words` words
    /// of each value in `values` along with its key.
    ///
    /// This does not wait for completion.
    pub fn sort_by_key<K: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        keys: BufferHandle,
        values: BufferHandle,
        len: usize,
        value_words: usize,
    ) -> Result<()> {
        if value_words == 0 || u32::try_from(value_words).is_err() {
            return Err(MortonSortError::InvalidSize {
                parameter: "value_words",
                value: value_words,
                reason: "values must be between one and u32::MAX words wide",
            });
        }
        let kernel = Kernel::KeyValueBitonic {
            key: K::NUMERIC_TYPE,
            value_words: value_words as u32,
        };
        self.queue_passes(surface, kernel, &[keys, values], len)
    }

    fn queue_passes<S: ExecutionSurface>(
        &self,
        surface: &mut S,
        kernel: Kernel,
        buffers: &[BufferHandle],
        len: usize,
    ) -> Result<()> {
        check_sort_len(len)?;
        let group = effective_group_size(self.group_size, surface.max_group_size(), len);
        let stages = len.trailing_zeros();

        debug!(
            "Queueing {} passes of {} over {} elements in groups of {}",
            pass_count(len),
            kernel,
            len,
            group
        );
        for stage in 0..stages {
            for pass in 0..=stage {
                trace!("{} stage {} pass {}", kernel, stage, pass);
                let mut dispatch = Dispatch::new(kernel, len, group)
                    .scalar(Scalar::U32(stage))
                    .scalar(Scalar::U32(pass));
                dispatch.buffers.extend_from_slice(buffers);
                surface.dispatch(dispatch)?;
            }
        }
        Ok(())
    }

    /// Sort `values` in place on `surface`.
    pub fn sort_slice<T: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        values: &mut [T],
    ) -> Result<()> {
        check_sort_len(values.len())?;

        let buffer = surface.upload_slice(values)?;
        let result = self
            .sort::<T, S>(surface, buffer, values.len())
            .and_then(|_| surface.await_completion())
            .and_then(|_| surface.download_vec::<T>(buffer));
        if result.is_err() {
            flush(surface);
        }
        surface.release(buffer)?;

        values.copy_from_slice(&result?);
        Ok(())
    }

    /// Sort `keys` in place on `surface`, permuting `values` the same way.
    ///
    /// `V` may be any plain-old-data type whose size is a multiple of four bytes.
    pub fn sort_slice_by_key<K: DeviceNum, V: Pod, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        keys: &mut [K],
        values: &mut [V],
    ) -> Result<()> {
        let len = keys.len();
        check_sort_len(len)?;
        if values.len() != len {
            return Err(MortonSortError::InvalidSize {
                parameter: "values",
                value: values.len(),
                reason: "must have one value per key",
            });
        }
        let value_size = std::mem::size_of::<V>();
        if value_size == 0 || value_size % 4 != 0 {
            return Err(MortonSortError::InvalidSize {
                parameter: "value size",
                value: value_size,
                reason: "must be a non-zero multiple of 4 bytes",
            });
        }

        let key_buffer = surface.upload_slice(keys)?;
        let value_buffer = match surface.upload_slice(values) {
            Ok(buffer) => buffer,
            Err(err) => {
                surface.release(key_buffer)?;
                return Err(err);
            }
        };

        let result = self
            .sort_by_key::<K, S>(surface, key_buffer, value_buffer, len, value_size / 4)
            .and_then(|_| surface.await_completion())
            .and_then(|_| {
                let sorted_keys = surface.download_vec::<K>(key_buffer)?;
                let sorted_values = surface.download_vec::<V>(value_buffer)?;
                Ok((sorted_keys, sorted_values))
            });
        if result.is_err() {
            flush(surface);
        }
        surface.release(key_buffer)?;
        surface.release(value_buffer)?;

        let (sorted_keys, sorted_values) = result?;
        keys.copy_from_slice(&sorted_keys);
        values.copy_from_slice(&sorted_values);
        Ok(())
    }
}

impl Default for BitonicSorter {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}

/// Drain the queue after a failure: every pending pass runs to completion (or fails) before
/// its buffers are released.
fn flush<S: ExecutionSurface>(surface: &mut S) {
    if let Err(err) = surface.await_completion() {
        debug!("Draining the sort queue failed: {}", err);
    }
}
