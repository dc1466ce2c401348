use crate::error::{MortonSortError, Result};
use crate::point::Point;
use crate::r#type::DeviceNum;
use crate::range::Range;
use crate::reduce::{run_reduction, Reduction};
use crate::surface::{BufferHandle, ExecutionSurface, Kernel};
use crate::util::{validate_group_size, DEFAULT_GROUP_SIZE};

/// Indices of the points holding the extreme coordinates of a point array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extrema {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl Extrema {
    /// The bounding box `(min corner, max corner)` of `points`.
    pub fn bounds<N: DeviceNum>(&self, points: &[Point<N>]) -> Result<(Point<N>, Point<N>)> {
        let point = |index: usize| {
            points
                .get(index)
                .copied()
                .ok_or(MortonSortError::IndexOutOfRange {
                    index: index as i64,
                    len: points.len(),
                })
        };
        Ok((
            Point::new(point(self.min_x)?.x, point(self.min_y)?.y),
            Point::new(point(self.max_x)?.x, point(self.max_y)?.y),
        ))
    }

    /// One range covering both axes: the smaller of the two minima and the larger of the two
    /// maxima. Keys derived from it keep the aspect ratio of the data.
    pub fn square_range<N: DeviceNum>(&self, points: &[Point<N>]) -> Result<Range<N>> {
        let (min, max) = self.bounds(points)?;
        let lower = if min.y < min.x { min.y } else { min.x };
        let upper = if max.y > max.x { max.y } else { max.x };
        Ok(Range::new(lower, upper))
    }
}

/// Finds the points holding the minimum and maximum x and y coordinates in a single reduction.
///
/// ```
/// use morton_sort::surface::HostSurface;
/// use morton_sort::{BoundingBoxReducer, Point};
///
/// let mut surface = HostSurface::new();
/// let points = Point::<f32>::grid(4);
/// let extrema = BoundingBoxReducer::default()
///     .reduce_slice(&mut surface, &points)
///     .unwrap();
/// assert_eq!(points[extrema.min_x], Point::new(0.0, 0.0));
/// assert_eq!(points[extrema.max_y], Point::new(0.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBoxReducer {
    group_size: usize,
}

impl BoundingBoxReducer {
    /// Create a reducer dispatching groups of `group_size` lanes.
    pub fn new(group_size: usize) -> Result<Self> {
        validate_group_size(group_size)?;
        Ok(Self { group_size })
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Reduce the first `len` points of type `Point<N>` stored in `points`.
    ///
    /// This waits for completion.
    pub fn reduce<N: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        points: BufferHandle,
        len: usize,
    ) -> Result<Extrema> {
        let reduction = Reduction {
            first: Kernel::BoundingBox(N::NUMERIC_TYPE),
            combine: Kernel::BoundingBoxCombine(N::NUMERIC_TYPE),
            width: 4,
        };
        let indices = run_reduction(surface, reduction, points, len, self.group_size)?;
        Ok(Extrema {
            min_x: indices[0],
            min_y: indices[1],
            max_x: indices[2],
            max_y: indices[3],
        })
    }

    /// Upload `points`, reduce them and release the upload.
    pub fn reduce_slice<N: DeviceNum, S: ExecutionSurface>(
        &self,
        surface: &mut S,
        points: &[Point<N>],
    ) -> Result<Extrema> {
        let buffer = surface.upload_slice(points)?;
        let result = self.reduce::<N, S>(surface, buffer, points.len());
        surface.release(buffer)?;
        result
    }
}

impl Default for BoundingBoxReducer {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}
