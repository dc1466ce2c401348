use std::cmp::Ordering;

use crate::point::Point;
use crate::r#type::DeviceNum;
use crate::surface::workgroup::WorkGroup;

/// Candidate index meaning "this lane holds no element".
pub(crate) const NO_CANDIDATE: i32 = -1;

/// Keep whichever of two candidate indices holds the extremum in direction `want`.
///
/// Equal values resolve to the lower index. A candidate whose value cannot be read, or does not
/// compare with itself (NaN), never wins over one that can.
#[inline]
fn pick<N: PartialOrd>(
    current: i32,
    other: i32,
    value: impl Fn(i32) -> Option<N>,
    want: Ordering,
) -> i32 {
    let comparable = |index| value(index).filter(|v| v.partial_cmp(v).is_some());
    let Some(b) = comparable(other) else {
        return current;
    };
    let Some(a) = comparable(current) else {
        return other;
    };
    match b.partial_cmp(&a) {
        Some(ord) if ord == want => other,
        Some(Ordering::Equal) if other < current => other,
        _ => current,
    }
}

#[inline]
fn lookup<T: Copy>(data: &[T], index: i32) -> Option<T> {
    usize::try_from(index)
        .ok()
        .and_then(|index| data.get(index).copied())
}

/// Binary tree reduction over every local region.
///
/// Region `r` holds one `(min, max)` index pair per lane, compared through `value(r, index)`.
/// After `log2(size)` steps lane 0 of each region holds the group's winners.
fn reduce_tree<N: PartialOrd>(group: &mut WorkGroup, value: impl Fn(usize, i32) -> Option<N>) {
    let mut half = group.size() / 2;
    while half > 0 {
        group.step(|lane, _, local| {
            if lane >= half {
                return;
            }
            for (region, pairs) in local.iter_mut().enumerate() {
                let (min_a, max_a) = (pairs[2 * lane], pairs[2 * lane + 1]);
                let (min_b, max_b) = (pairs[2 * (lane + half)], pairs[2 * (lane + half) + 1]);
                pairs[2 * lane] = pick(min_a, min_b, |i| value(region, i), Ordering::Less);
                pairs[2 * lane + 1] = pick(max_a, max_b, |i| value(region, i), Ordering::Greater);
            }
        });
        half /= 2;
    }
}

/// First min/max pass: every lane starts with its own global index.
pub(crate) fn min_max<N: DeviceNum>(
    group: &mut WorkGroup,
    values: &[N],
    len: usize,
    out: &mut [i32],
) {
    group.step(|lane, gid, local| {
        let candidate = if gid < len { gid as i32 } else { NO_CANDIDATE };
        local[0][2 * lane] = candidate;
        local[0][2 * lane + 1] = candidate;
    });
    reduce_tree(group, |_, i| lookup(values, i));
    out[0] = group.local(0)[0];
    out[1] = group.local(0)[1];
}

/// Min/max combine pass: every lane starts with one `(min, max)` pair of a previous pass.
pub(crate) fn min_max_combine<N: DeviceNum>(
    group: &mut WorkGroup,
    values: &[N],
    candidates: &[i32],
    count: usize,
    out: &mut [i32],
) {
    group.step(|lane, gid, local| {
        let (min, max) = if gid < count {
            (candidates[2 * gid], candidates[2 * gid + 1])
        } else {
            (NO_CANDIDATE, NO_CANDIDATE)
        };
        local[0][2 * lane] = min;
        local[0][2 * lane + 1] = max;
    });
    reduce_tree(group, |_, i| lookup(values, i));
    out[0] = group.local(0)[0];
    out[1] = group.local(0)[1];
}

/// First bounding-box pass. Region 0 tracks x extrema, region 1 y extrema.
pub(crate) fn bounding_box<N: DeviceNum>(
    group: &mut WorkGroup,
    points: &[Point<N>],
    len: usize,
    out: &mut [i32],
) {
    group.step(|lane, gid, local| {
        let candidate = if gid < len { gid as i32 } else { NO_CANDIDATE };
        for pairs in local.iter_mut() {
            pairs[2 * lane] = candidate;
            pairs[2 * lane + 1] = candidate;
        }
    });
    reduce_tree(group, |axis, i| lookup(points, i).map(|p| p.axis(axis)));
    write_extrema(group, out);
}

/// Bounding-box combine pass over `(min_x, min_y, max_x, max_y)` candidates.
pub(crate) fn bounding_box_combine<N: DeviceNum>(
    group: &mut WorkGroup,
    points: &[Point<N>],
    candidates: &[i32],
    count: usize,
    out: &mut [i32],
) {
    group.step(|lane, gid, local| {
        for (axis, pairs) in local.iter_mut().enumerate() {
            let (min, max) = if gid < count {
                (candidates[4 * gid + axis], candidates[4 * gid + 2 + axis])
            } else {
                (NO_CANDIDATE, NO_CANDIDATE)
            };
            pairs[2 * lane] = min;
            pairs[2 * lane + 1] = max;
        }
    });
    reduce_tree(group, |axis, i| lookup(points, i).map(|p| p.axis(axis)));
    write_extrema(group, out);
}

#[inline]
fn write_extrema(group: &WorkGroup, out: &mut [i32]) {
    let (x, y) = (group.local(0), group.local(1));
    out[0] = x[0];
    out[1] = y[0];
    out[2] = x[1];
    out[3] = y[1];
}
