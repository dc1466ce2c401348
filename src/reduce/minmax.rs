use crate::error::Result;
use crate::r#type::DeviceNum;
use crate::reduce::{run_reduction, Reduction};
use crate::surface::{BufferHandle, ExecutionSurface, Kernel};
use crate::util::{validate_group_size, DEFAULT_GROUP_SIZE};

/// Indices of the minimum and maximum element of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMaxIndices {
    pub min: usize,
    pub max: usize,
}

/// Finds the indices of the smallest and largest value of a numeric array.
///
/// Equal values resolve to the lowest index, independent of the group size. NaN values are
/// skipped unless every value is NaN.
///
/// ```
/// use morton_sort::surface::HostSurface;
/// use morton_sort::MinMaxReducer;
///
/// let mut surface = HostSurface::new();
/// let reducer = MinMaxReducer::new(4).unwrap();
/// let found = reducer
///     .reduce_slice(&mut surface, &[3.0f32, -1.0, 9.0, -1.0, 9.0])
///     .unwrap();
/// assert_eq!((found.min, found.max), (1, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMaxReducer {
    group_size: usize,
}

impl MinMaxReducer {
    /// Create a reducer dispatching groups of `group_size` lanes.
    pub fn new(group_size: usize) -> Result<Self> {
        validate_group_size(group_size)?;
        Ok(Self { group_size })
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Reduce the first `len` values of type `N` stored in `values`.
    ///
    /// This waits for completion. `len` need not be a multiple of the group size.
    pub fn reduce<N: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        values: BufferHandle,
        len: usize,
    ) -> Result<MinMaxIndices> {
        let reduction = Reduction {
            first: Kernel::MinMax(N::NUMERIC_TYPE),
            combine: Kernel::MinMaxCombine(N::NUMERIC_TYPE),
            width: 2,
        };
        let indices = run_reduction(surface, reduction, values, len, self.group_size)?;
        Ok(MinMaxIndices {
            min: indices[0],
            max: indices[1],
        })
    }

    /// Upload `values`, reduce them and release the upload.
    pub fn reduce_slice<N: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        values: &[N],
    ) -> Result<MinMaxIndices> {
        let buffer = surface.upload_slice(values)?;
        let result = self.reduce::<N, S>(surface, buffer, values.len());
        surface.release(buffer)?;
        result
    }
}

impl Default for MinMaxReducer {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}
