use crate::error::Result;
use crate::r#type::{DeviceNum, NumericType};
use crate::range::Range;
use crate::util::{validate_group_size, DEFAULT_GROUP_SIZE};

/// Where the pipeline takes its normalization range from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RangeSource<N: DeviceNum> {
    /// Use this range as given.
    Explicit(Range<N>),
    /// Reduce the flattened `x0, y0, x1, y1, ...` scalars to their minimum and maximum.
    #[default]
    MinMax,
    /// Reduce the points to their bounding box and span both axes with one range.
    BoundingBox,
}

/// Settings of a [`SortPipeline`](crate::SortPipeline).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortConfig<N: DeviceNum> {
    group_size: usize,
    range: RangeSource<N>,
}

impl<N: DeviceNum> SortConfig<N> {
    /// The default configuration: groups of [`DEFAULT_GROUP_SIZE`] lanes and a min/max range.
    pub fn new() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            range: RangeSource::MinMax,
        }
    }

    /// Set the number of lanes per work-group. Must be a power of two.
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn with_range(mut self, range: RangeSource<N>) -> Self {
        self.range = range;
        self
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn range(&self) -> RangeSource<N> {
        self.range
    }

    /// The coordinate type kernels are instantiated for.
    pub fn numeric_type(&self) -> NumericType {
        N::NUMERIC_TYPE
    }

    /// Check the group size, and an explicit range if there is one.
    pub fn validate(&self) -> Result<()> {
        validate_group_size(self.group_size)?;
        if let RangeSource::Explicit(range) = self.range {
            range.validate("explicit range")?;
        }
        Ok(())
    }
}

impl<N: DeviceNum> Default for SortConfig<N> {
    fn default() -> Self {
        Self::new()
    }
}
