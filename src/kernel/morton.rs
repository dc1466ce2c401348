#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::morton::morton_key;
use crate::point::Point;
use crate::r#type::DeviceNum;

/// Derive one key per point. Work-groups of `group_size` lanes are independent.
pub(crate) fn morton<N: DeviceNum>(
    points: &[Point<N>],
    keys: &mut [u32],
    min: f64,
    max: f64,
    group_size: usize,
) {
    debug_assert_eq!(points.len(), keys.len());

    #[cfg(feature = "rayon")]
    {
        keys.par_chunks_mut(group_size)
            .zip(points.par_chunks(group_size))
            .for_each(|(keys, points)| encode_group(points, keys, min, max));
    }

    #[cfg(not(feature = "rayon"))]
    {
        keys.chunks_mut(group_size)
            .zip(points.chunks(group_size))
            .for_each(|(keys, points)| encode_group(points, keys, min, max));
    }
}

#[inline]
fn encode_group<N: DeviceNum>(points: &[Point<N>], keys: &mut [u32], min: f64, max: f64) {
    for (key, point) in keys.iter_mut().zip(points) {
        *key = morton_key(point, min, max);
    }
}
