use crate::error::{MortonSortError, Result};
use crate::r#type::DeviceNum;

/// The `(min, max)` normalization domain used to derive Morton keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range<N: DeviceNum> {
    pub min: N,
    pub max: N,
}

impl<N: DeviceNum> Range<N> {
    /// Create a range without validating it. Use [`Range::validate`] before deriving keys.
    pub fn new(min: N, max: N) -> Self {
        Self { min, max }
    }

    /// Create a range, failing with [`MortonSortError::DegenerateRange`] unless `max > min`.
    pub fn try_new(min: N, max: N) -> Result<Self> {
        let range = Self::new(min, max);
        range.validate("range")?;
        Ok(range)
    }

    /// Check `max > min`. `parameter` names the range in the error.
    ///
    /// NaN bounds fail the check as well.
    pub fn validate(&self, parameter: &'static str) -> Result<()> {
        if self.max > self.min {
            Ok(())
        } else {
            Err(MortonSortError::DegenerateRange {
                parameter,
                min: self.min.into(),
                max: self.max.into(),
            })
        }
    }
}
