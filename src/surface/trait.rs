use bytemuck::Pod;

use crate::error::{MortonSortError, Result};
use crate::surface::dispatch::{BufferHandle, Dispatch};

/// A device that runs kernels over work-groups and owns the buffers they touch.
///
/// Dispatches are queued and complete in submission order; a later dispatch always observes every
/// write of an earlier one. Results may only be downloaded once [`await_completion`] has returned.
///
/// [`await_completion`]: ExecutionSurface::await_completion
pub trait ExecutionSurface {
    /// Copy host bytes into a new device buffer.
    fn upload(&mut self, bytes: &[u8]) -> Result<BufferHandle>;

    /// Allocate a zeroed device buffer of `byte_length` bytes.
    fn allocate(&mut self, byte_length: usize) -> Result<BufferHandle>;

    /// Copy a device buffer back to the host.
    fn download(&mut self, buffer: BufferHandle) -> Result<Vec<u8>>;

    /// Free a device buffer.
    fn release(&mut self, buffer: BufferHandle) -> Result<()>;

    /// Queue a kernel launch.
    fn dispatch(&mut self, dispatch: Dispatch) -> Result<()>;

    /// Block until every queued dispatch has completed.
    ///
    /// If a dispatch fails, the dispatches queued after it are discarded and the error is
    /// returned.
    fn await_completion(&mut self) -> Result<()>;

    /// The largest work-group this surface can run.
    fn max_group_size(&self) -> usize;

    /// Upload a typed slice.
    fn upload_slice<T: Pod>(&mut self, data: &[T]) -> Result<BufferHandle>
    where
        Self: Sized,
    {
        self.upload(bytemuck::cast_slice(data))
    }

    /// Download a buffer as a typed vector.
    fn download_vec<T: Pod>(&mut self, buffer: BufferHandle) -> Result<Vec<T>>
    where
        Self: Sized,
    {
        let bytes = self.download(buffer)?;
        let size = std::mem::size_of::<T>();
        if size == 0 || bytes.len() % size != 0 {
            return Err(MortonSortError::DeviceFailure(format!(
                "buffer of {} bytes cannot hold elements of {} bytes",
                bytes.len(),
                size
            )));
        }

        let mut out = vec![<T as bytemuck::Zeroable>::zeroed(); bytes.len() / size];
        bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(&bytes);
        Ok(out)
    }
}

impl<S: ExecutionSurface + ?Sized> ExecutionSurface for &mut S {
    fn upload(&mut self, bytes: &[u8]) -> Result<BufferHandle> {
        (**self).upload(bytes)
    }

    fn allocate(&mut self, byte_length: usize) -> Result<BufferHandle> {
        (**self).allocate(byte_length)
    }

    fn download(&mut self, buffer: BufferHandle) -> Result<Vec<u8>> {
        (**self).download(buffer)
    }

    fn release(&mut self, buffer: BufferHandle) -> Result<()> {
        (**self).release(buffer)
    }

    fn dispatch(&mut self, dispatch: Dispatch) -> Result<()> {
        (**self).dispatch(dispatch)
    }

    fn await_completion(&mut self) -> Result<()> {
        (**self).await_completion()
    }

    fn max_group_size(&self) -> usize {
        (**self).max_group_size()
    }
}
