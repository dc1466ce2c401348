#![doc = include_str!("../README.md")]

pub mod bitonic;
mod error;
mod kernel;
pub mod morton;
pub mod pipeline;
mod point;
mod range;
pub mod reduce;
pub mod surface;
mod r#type;
mod util;

pub use bitonic::BitonicSorter;
pub use error::{MortonSortError, Result};
pub use morton::MortonEncoder;
pub use pipeline::{RangeSource, SortConfig, SortPipeline, SortedPoints};
pub use point::{flatten, Point};
pub use r#type::{DeviceNum, NumericType};
pub use range::Range;
pub use reduce::{BoundingBoxReducer, Extrema, MinMaxIndices, MinMaxReducer};
pub use util::DEFAULT_GROUP_SIZE;

#[cfg(test)]
pub(crate) mod test;
