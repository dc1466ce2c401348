//! The Morton sort pipeline: range, then keys, then a key/value sort.

mod config;

pub use config::{RangeSource, SortConfig};

use geo_traits::CoordTrait;
use log::{debug, info, warn};

use crate::bitonic::BitonicSorter;
use crate::error::{MortonSortError, Result};
use crate::morton::MortonEncoder;
use crate::point::Point;
use crate::r#type::DeviceNum;
use crate::range::Range;
use crate::reduce::{BoundingBoxReducer, Extrema, MinMaxReducer};
use crate::surface::{BufferHandle, ExecutionSurface};
use crate::util::check_sort_len;

/// The output of a successful [`SortPipeline::sort`].
#[derive(Debug, Clone, PartialEq)]
pub struct SortedPoints<N: DeviceNum> {
    /// The input points in ascending key order.
    pub points: Vec<Point<N>>,
    /// The Morton key of each sorted point.
    pub keys: Vec<u32>,
    /// The normalization range the keys were derived with.
    pub range: Range<N>,
}

/// Sorts 2-D points along the Morton curve on an execution surface.
///
/// The surface is owned by the pipeline. Pass `&mut surface` to keep using it afterwards.
///
/// ```
/// use morton_sort::surface::HostSurface;
/// use morton_sort::{Point, SortPipeline};
///
/// let mut pipeline = SortPipeline::new(HostSurface::new());
/// let points = vec![
///     Point::new(3.0f32, 3.0),
///     Point::new(0.0, 0.0),
///     Point::new(0.0, 3.0),
///     Point::new(3.0, 0.0),
/// ];
/// let sorted = pipeline.sort(&points).unwrap();
/// assert_eq!(
///     sorted.points,
///     vec![
///         Point::new(0.0, 0.0),
///         Point::new(3.0, 0.0),
///         Point::new(0.0, 3.0),
///         Point::new(3.0, 3.0),
///     ]
/// );
/// ```
#[derive(Debug)]
pub struct SortPipeline<N: DeviceNum, S: ExecutionSurface> {
    surface: S,
    config: SortConfig<N>,
}

impl<N: DeviceNum, S: ExecutionSurface> SortPipeline<N, S> {
    /// Create a pipeline with the default configuration.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            config: SortConfig::default(),
        }
    }

    /// Create a pipeline with a custom configuration.
    pub fn new_with_config(surface: S, config: SortConfig<N>) -> Result<Self> {
        config.validate()?;
        Ok(Self { surface, config })
    }

    pub fn config(&self) -> &SortConfig<N> {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Consume the pipeline and give back the surface.
    pub fn into_inner(self) -> S {
        self.surface
    }

    /// Compute the normalization range of `points` the way [`SortPipeline::sort`] would.
    pub fn range(&mut self, points: &[Point<N>]) -> Result<Range<N>> {
        if let RangeSource::Explicit(range) = self.config.range() {
            range.validate("explicit range")?;
            return Ok(range);
        }
        self.with_points(points, |pipeline, buffer, _| {
            pipeline.compute_range(points, buffer)
        })
    }

    /// Find the points holding the smallest and largest x and y coordinates.
    pub fn extrema(&mut self, points: &[Point<N>]) -> Result<Extrema> {
        info!("Reducing {} points to their extrema", points.len());
        let reducer = BoundingBoxReducer::new(self.config.group_size())?;
        reducer.reduce_slice(&mut self.surface, points)
    }

    /// Sort `points` by their Morton keys.
    ///
    /// The number of points must be a power of two. Nothing is returned unless every phase
    /// succeeds, and every buffer allocated on the surface is released either way.
    pub fn sort(&mut self, points: &[Point<N>]) -> Result<SortedPoints<N>> {
        check_sort_len(points.len())?;
        self.with_points(points, |pipeline, buffer, temporaries| {
            pipeline.run_sort(points, buffer, temporaries)
        })
    }

    /// Sort any [`CoordTrait`] coordinates by their Morton keys.
    pub fn sort_coords<C: CoordTrait<T = N>>(
        &mut self,
        coords: impl IntoIterator<Item = C>,
    ) -> Result<SortedPoints<N>> {
        let points: Vec<Point<N>> = coords
            .into_iter()
            .map(|coord| Point::from_coord(&coord))
            .collect();
        self.sort(&points)
    }

    /// Upload `points`, run `f` and release every buffer it registered, whether it failed or not.
    fn with_points<T>(
        &mut self,
        points: &[Point<N>],
        f: impl FnOnce(&mut Self, BufferHandle, &mut Vec<BufferHandle>) -> Result<T>,
    ) -> Result<T> {
        let buffer = self.surface.upload_slice(points)?;
        let mut temporaries = vec![buffer];

        let result = f(self, buffer, &mut temporaries);
        if result.is_err() {
            if let Err(err) = self.surface.await_completion() {
                debug!("Draining the queue failed: {}", err);
            }
        }

        let mut released = Ok(());
        for buffer in temporaries {
            if let Err(err) = self.surface.release(buffer) {
                warn!("Failed to release buffer {}: {}", buffer.id(), err);
                released = Err(err);
            }
        }
        let value = result?;
        released?;
        Ok(value)
    }

    fn compute_range(&mut self, points: &[Point<N>], buffer: BufferHandle) -> Result<Range<N>> {
        let group_size = self.config.group_size();
        let range = match self.config.range() {
            RangeSource::Explicit(range) => {
                range.validate("explicit range")?;
                return Ok(range);
            }
            RangeSource::MinMax => {
                let reducer = MinMaxReducer::new(group_size)?;
                let found = reducer.reduce::<N, S>(&mut self.surface, buffer, points.len() * 2)?;
                Range::new(flat_scalar(points, found.min)?, flat_scalar(points, found.max)?)
            }
            RangeSource::BoundingBox => {
                let reducer = BoundingBoxReducer::new(group_size)?;
                reducer
                    .reduce::<N, S>(&mut self.surface, buffer, points.len())?
                    .square_range(points)?
            }
        };
        range.validate("computed range")?;
        Ok(range)
    }

    fn run_sort(
        &mut self,
        points: &[Point<N>],
        buffer: BufferHandle,
        temporaries: &mut Vec<BufferHandle>,
    ) -> Result<SortedPoints<N>> {
        let len = points.len();
        let group_size = self.config.group_size();

        info!("Computing the range of {} points", len);
        let range = self.compute_range(points, buffer)?;
        debug!("Normalizing to [{:?}, {:?}]", range.min, range.max);

        info!("Deriving Morton keys");
        let keys = MortonEncoder::new(group_size)?.encode(&mut self.surface, buffer, len, range)?;
        temporaries.push(keys);

        info!("Sorting {} points by key", len);
        BitonicSorter::new(group_size)?.sort_by_key::<u32, S>(
            &mut self.surface,
            keys,
            buffer,
            len,
            Point::<N>::WORDS,
        )?;
        self.surface.await_completion()?;

        let sorted = SortedPoints {
            points: self.surface.download_vec(buffer)?,
            keys: self.surface.download_vec(keys)?,
            range,
        };
        info!("Sorted {} points", len);
        Ok(sorted)
    }
}

/// Scalar `index` of the flattened `x0, y0, x1, y1, ...` view of `points`.
fn flat_scalar<N: DeviceNum>(points: &[Point<N>], index: usize) -> Result<N> {
    points
        .get(index / 2)
        .map(|point| point.axis(index % 2))
        .ok_or(MortonSortError::IndexOutOfRange {
            index: index as i64,
            len: points.len() * 2,
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::surface::HostSurface;

    #[test]
    fn flat_index_maps_to_point_axis() {
        let points = vec![Point::new(1, 2), Point::new(3, 4)];
        assert_eq!(flat_scalar(&points, 0).unwrap(), 1);
        assert_eq!(flat_scalar(&points, 3).unwrap(), 4);
        assert!(flat_scalar(&points, 4).is_err());
    }

    #[test]
    fn range_modes() {
        let points = vec![
            Point::new(-2.0f32, 10.0),
            Point::new(4.0, 1.0),
            Point::new(0.0, 6.0),
            Point::new(1.0, -3.0),
        ];
        let mut surface = HostSurface::new();

        let mut pipeline = SortPipeline::new(&mut surface);
        assert_eq!(pipeline.range(&points).unwrap(), Range::new(-3.0, 10.0));

        let config = SortConfig::new().with_range(RangeSource::BoundingBox);
        let mut pipeline = SortPipeline::new_with_config(&mut surface, config).unwrap();
        assert_eq!(pipeline.range(&points).unwrap(), Range::new(-3.0, 10.0));

        let explicit = Range::new(-100.0, 100.0);
        let config = SortConfig::new().with_range(RangeSource::Explicit(explicit));
        let mut pipeline = SortPipeline::new_with_config(&mut surface, config).unwrap();
        assert_eq!(pipeline.range(&points).unwrap(), explicit);

        assert_eq!(surface.live_buffers(), 0);
    }

    #[test]
    fn identical_points_have_degenerate_range() {
        let mut pipeline = SortPipeline::new(HostSurface::new());
        let points = vec![Point::new(2i32, 2); 8];
        assert!(matches!(
            pipeline.sort(&points),
            Err(MortonSortError::DegenerateRange {
                parameter: "computed range",
                ..
            })
        ));
        assert_eq!(pipeline.surface().live_buffers(), 0);
    }

    #[test]
    fn rejects_bad_lengths() {
        let mut pipeline = SortPipeline::new(HostSurface::new());
        assert!(matches!(
            pipeline.sort(&Point::<f32>::grid(3)),
            Err(MortonSortError::InvalidSize { value: 9, .. })
        ));
        assert!(matches!(
            pipeline.sort(&[]),
            Err(MortonSortError::InvalidSize { value: 0, .. })
        ));
        let surface = pipeline.into_inner();
        assert_eq!(surface.live_buffers(), 0);
        assert_eq!(surface.completed_dispatches(), 0);
    }

    #[test]
    fn single_lane_surface_is_rejected() {
        let mut pipeline = SortPipeline::new(HostSurface::new_with_max_group_size(1));
        assert!(matches!(
            pipeline.sort(&Point::<i32>::grid(2)),
            Err(MortonSortError::InvalidSize {
                parameter: "max_group_size",
                ..
            })
        ));
        let surface = pipeline.into_inner();
        assert_eq!(surface.live_buffers(), 0);
        assert_eq!(surface.completed_dispatches(), 0);
    }

    #[test]
    fn extrema_of_grid() {
        let mut pipeline = SortPipeline::new(HostSurface::new());
        let points = Point::<i32>::grid(4);
        let extrema = pipeline.extrema(&points).unwrap();
        assert_eq!(extrema.min_x, 0);
        assert_eq!(extrema.min_y, 0);
        assert_eq!(
            extrema.bounds(&points).unwrap(),
            (Point::new(0, 0), Point::new(3, 3))
        );
    }
}
