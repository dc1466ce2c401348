use std::fmt::Debug;
use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
pub enum MortonSortError {
    /// A length or group size violates the power-of-two / divisibility requirements.
    #[error("Invalid size for {parameter}: {value} ({reason})")]
    InvalidSize {
        parameter: &'static str,
        value: usize,
        reason: &'static str,
    },

    /// A normalization range with `max <= min`.
    #[error("Degenerate {parameter}: max ({max}) must be greater than min ({min})")]
    DegenerateRange {
        parameter: &'static str,
        min: f64,
        max: f64,
    },

    /// The execution surface failed to transfer data or run a dispatch.
    #[error("Device failure: {0}")]
    DeviceFailure(String),

    /// A reduction produced an index that does not address the input.
    #[error("Index {index} out of range for {len} elements")]
    IndexOutOfRange { index: i64, len: usize },
}

pub type Result<T> = std::result::Result<T, MortonSortError>;
