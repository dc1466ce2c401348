//! Morton (Z-order) keys for 2-D points.

use log::debug;

use crate::error::Result;
use crate::point::Point;
use crate::r#type::DeviceNum;
use crate::range::Range;
use crate::surface::{BufferHandle, Dispatch, ExecutionSurface, Kernel, Scalar};
use crate::util::{effective_group_size, validate_group_size, DEFAULT_GROUP_SIZE};

/// Normalized coordinates are scaled onto `0..=MORTON_SCALE` before clamping.
pub const MORTON_SCALE: f64 = 32768.0;

/// The largest quantized coordinate. Each axis contributes 15 bits to a key.
pub const MORTON_MAX: u32 = 32767;

/// Spread the low 16 bits of `v` so that bit `i` lands on bit `2 * i`.
#[inline]
pub fn spread_bits(v: u32) -> u32 {
    let mut v = v & 0xFFFF;
    v = (v | (v << 8)) & 0x00FF00FF;
    v = (v | (v << 4)) & 0x0F0F0F0F;
    v = (v | (v << 2)) & 0x33333333;
    v = (v | (v << 1)) & 0x55555555;
    v
}

/// Quantize `coord` onto `0..=MORTON_MAX` relative to a range starting at `min` of width
/// `width`.
#[inline]
pub fn quantize(coord: f64, min: f64, width: f64) -> u32 {
    let v = ((coord - min) / width * MORTON_SCALE).round();
    // NaN saturates to 0
    v.clamp(0.0, MORTON_MAX as f64) as u32
}

/// The Morton key of `point`, with both axes normalized to the same `min..max` range.
#[inline]
pub fn morton_key<N: DeviceNum>(point: &Point<N>, min: f64, max: f64) -> u32 {
    let width = max - min;
    let x = quantize(point.x.into(), min, width);
    let y = quantize(point.y.into(), min, width);
    spread_bits(x) | (spread_bits(y) << 1)
}

/// Derives one Morton key per point on an execution surface.
///
/// ```
/// use morton_sort::surface::HostSurface;
/// use morton_sort::{MortonEncoder, Point, Range};
///
/// let mut surface = HostSurface::new();
/// let points = vec![Point::new(0.0f32, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)];
/// let keys = MortonEncoder::default()
///     .encode_slice(&mut surface, &points, Range::new(0.0, 1.0))
///     .unwrap();
/// assert_eq!(keys, vec![0, 0x1555_5555, 0x2AAA_AAAA]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MortonEncoder {
    group_size: usize,
}

impl MortonEncoder {
    /// Create an encoder dispatching groups of `group_size` lanes.
    pub fn new(group_size: usize) -> Result<Self> {
        validate_group_size(group_size)?;
        Ok(Self { group_size })
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Queue the derivation of keys for the first `len` points of `points`.
    ///
    /// Returns a new `u32` key buffer owned by the caller. This does not wait for completion.
    pub fn encode<N: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        points: BufferHandle,
        len: usize,
        range: Range<N>,
    ) -> Result<BufferHandle> {
        range.validate("normalization range")?;

        let group = effective_group_size(self.group_size, surface.max_group_size(), len);
        let num_groups = len.div_ceil(group).max(1);
        let keys = surface.allocate(len * std::mem::size_of::<u32>())?;

        debug!(
            "Encoding {} points over [{:?}, {:?}] in {} groups of {}",
            len, range.min, range.max, num_groups, group
        );
        let dispatch = Dispatch::new(Kernel::Morton(N::NUMERIC_TYPE), num_groups * group, group)
            .buffer(points)
            .buffer(keys)
            .scalar(Scalar::from_num(range.min))
            .scalar(Scalar::from_num(range.max))
            .scalar(Scalar::U32(len as u32));
        if let Err(err) = surface.dispatch(dispatch) {
            surface.release(keys)?;
            return Err(err);
        }
        Ok(keys)
    }

    /// Upload `points`, derive their keys and download them.
    pub fn encode_slice<N: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        points: &[Point<N>],
        range: Range<N>,
    ) -> Result<Vec<u32>> {
        range.validate("normalization range")?;

        let buffer = surface.upload_slice(points)?;
        let result = self
            .encode(surface, buffer, points.len(), range)
            .and_then(|keys| {
                let result = surface
                    .await_completion()
                    .and_then(|_| surface.download_vec::<u32>(keys));
                surface.release(keys)?;
                result
            });
        surface.release(buffer)?;
        result
    }
}

impl Default for MortonEncoder {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}
