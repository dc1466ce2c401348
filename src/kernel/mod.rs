//! Kernel bodies run by the [`HostSurface`](crate::surface::HostSurface).
//!
//! Each function is the per-group (or per-pass) work of one [`Kernel`](crate::surface::Kernel)
//! variant, operating on already-typed views of the bound buffers.

mod bitonic;
mod morton;
mod reduce;

pub(crate) use bitonic::{bitonic_pass, key_value_bitonic_pass};
pub(crate) use morton::morton;
pub(crate) use reduce::{bounding_box, bounding_box_combine, min_max, min_max_combine};
