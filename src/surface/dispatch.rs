use std::fmt::Display;

use crate::error::{MortonSortError, Result};
use crate::r#type::{DeviceNum, NumericType};

/// An opaque reference to a buffer owned by an execution surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

impl BufferHandle {
    /// Wrap a surface-specific buffer id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A scalar argument passed by value to a kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I32(i32),
    U32(u32),
    F32(f32),
}

impl Scalar {
    /// Wrap a value of any device scalar type.
    pub fn from_num<N: DeviceNum>(value: N) -> Self {
        match N::NUMERIC_TYPE {
            NumericType::Int32 => Scalar::I32(bytemuck::cast(value)),
            NumericType::UInt32 => Scalar::U32(bytemuck::cast(value)),
            NumericType::Float32 => Scalar::F32(bytemuck::cast(value)),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::I32(v) => v.into(),
            Scalar::U32(v) => v.into(),
            Scalar::F32(v) => v.into(),
        }
    }
}

/// The kernels an execution surface must provide.
///
/// Each variant documents its bindings: the buffers in order, the scalars in order, and the local
/// memory regions (see [`Kernel::local_memory`]). Candidate buffers hold `i32` indices, with `-1`
/// meaning "no candidate".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// First min/max reduction pass.
    ///
    /// Buffers: `[values, candidates]`, `candidates` receives `(min, max)` per group.
    /// Scalars: `[len: U32]`.
    MinMax(NumericType),
    /// Min/max combine pass over a previous pass's candidates.
    ///
    /// Buffers: `[values, candidates_in, candidates_out]`.
    /// Scalars: `[candidate_count: U32]`.
    MinMaxCombine(NumericType),
    /// First bounding-box reduction pass over points.
    ///
    /// Buffers: `[points, candidates]`, `candidates` receives `(min_x, min_y, max_x, max_y)` per
    /// group. Scalars: `[len: U32]`.
    BoundingBox(NumericType),
    /// Bounding-box combine pass.
    ///
    /// Buffers: `[points, candidates_in, candidates_out]`.
    /// Scalars: `[candidate_count: U32]`.
    BoundingBoxCombine(NumericType),
    /// Morton key derivation.
    ///
    /// Buffers: `[points, keys: u32]`. Scalars: `[min, max, len: U32]`.
    Morton(NumericType),
    /// One compare-exchange pass of the bitonic network over plain values.
    ///
    /// Buffers: `[values]`. Scalars: `[stage: U32, pass: U32]`.
    Bitonic(NumericType),
    /// One compare-exchange pass moving `value_words` 32-bit words alongside every key.
    ///
    /// Buffers: `[keys, values]`. Scalars: `[stage: U32, pass: U32]`.
    KeyValueBitonic { key: NumericType, value_words: u32 },
}

impl Kernel {
    /// The name of the kernel function.
    pub fn name(&self) -> &'static str {
        match self {
            Kernel::MinMax(_) => "minMax",
            Kernel::MinMaxCombine(_) => "minMaxCombine",
            Kernel::BoundingBox(_) => "boundingBox",
            Kernel::BoundingBoxCombine(_) => "boundingBoxCombine",
            Kernel::Morton(_) => "mortonNumber",
            Kernel::Bitonic(_) => "parallelBitonic",
            Kernel::KeyValueBitonic { .. } => "keyValueBitonic",
        }
    }

    /// The scalar type this kernel is instantiated for.
    pub fn numeric_type(&self) -> NumericType {
        match *self {
            Kernel::MinMax(t)
            | Kernel::MinMaxCombine(t)
            | Kernel::BoundingBox(t)
            | Kernel::BoundingBoxCombine(t)
            | Kernel::Morton(t)
            | Kernel::Bitonic(t) => t,
            Kernel::KeyValueBitonic { key, .. } => key,
        }
    }

    /// Byte sizes of the local memory regions a group of `group_size` lanes needs.
    ///
    /// Reductions keep one `(min, max)` pair of `i32` indices per lane and per axis.
    pub fn local_memory(&self, group_size: usize) -> Vec<usize> {
        let pair_region = group_size * 2 * std::mem::size_of::<i32>();
        match self {
            Kernel::MinMax(_) | Kernel::MinMaxCombine(_) => vec![pair_region],
            Kernel::BoundingBox(_) | Kernel::BoundingBoxCombine(_) => {
                vec![pair_region, pair_region]
            }
            Kernel::Morton(_) | Kernel::Bitonic(_) | Kernel::KeyValueBitonic { .. } => vec![],
        }
    }
}

impl Display for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<{}>", self.name(), self.numeric_type())
    }
}

/// One kernel launch: a kernel over `grid_size` lanes split into groups of `group_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub kernel: Kernel,
    pub grid_size: usize,
    pub group_size: usize,
    pub buffers: Vec<BufferHandle>,
    pub scalars: Vec<Scalar>,
    pub local_mem_sizes: Vec<usize>,
}

impl Dispatch {
    /// Create a dispatch with the local memory the kernel needs and no bindings yet.
    pub fn new(kernel: Kernel, grid_size: usize, group_size: usize) -> Self {
        Self {
            kernel,
            grid_size,
            group_size,
            buffers: vec![],
            scalars: vec![],
            local_mem_sizes: kernel.local_memory(group_size),
        }
    }

    /// Bind the next buffer.
    pub fn buffer(mut self, buffer: BufferHandle) -> Self {
        self.buffers.push(buffer);
        self
    }

    /// Bind the next scalar.
    pub fn scalar(mut self, scalar: Scalar) -> Self {
        self.scalars.push(scalar);
        self
    }

    pub fn num_groups(&self) -> usize {
        if self.group_size == 0 {
            0
        } else {
            self.grid_size / self.group_size
        }
    }

    /// Whether this dispatch reads or writes `buffer`.
    pub fn binds(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains(&buffer)
    }

    /// The bound buffers, which must be exactly `K`.
    pub fn bindings<const K: usize>(&self) -> Result<[BufferHandle; K]> {
        <[BufferHandle; K]>::try_from(self.buffers.as_slice()).map_err(|_| {
            MortonSortError::DeviceFailure(format!(
                "{} expects {} buffers, got {}",
                self.kernel,
                K,
                self.buffers.len()
            ))
        })
    }

    /// Scalar argument `index`, which must be a `U32`.
    pub fn scalar_u32(&self, index: usize) -> Result<u32> {
        match self.scalars.get(index) {
            Some(Scalar::U32(v)) => Ok(*v),
            other => Err(MortonSortError::DeviceFailure(format!(
                "{} expects a u32 scalar at {}, got {:?}",
                self.kernel, index, other
            ))),
        }
    }

    /// Scalar argument `index` of any type, widened to `f64`.
    pub fn scalar_f64(&self, index: usize) -> Result<f64> {
        self.scalars.get(index).map(Scalar::as_f64).ok_or_else(|| {
            MortonSortError::DeviceFailure(format!(
                "{} expects a scalar at {}",
                self.kernel, index
            ))
        })
    }
}
