//! The execution surface: where kernels run and buffers live.
//!
//! The core algorithms never touch device memory directly. They upload inputs, queue
//! [`Dispatch`]es of [`Kernel`]s against opaque [`BufferHandle`]s, wait for completion and download
//! results, all through the [`ExecutionSurface`] trait. [`HostSurface`] implements it on the CPU.

mod dispatch;
mod host;
mod r#trait;
pub(crate) mod workgroup;

pub use dispatch::{BufferHandle, Dispatch, Kernel, Scalar};
pub use host::{HostSurface, DEFAULT_MAX_GROUP_SIZE};
pub use r#trait::ExecutionSurface;
