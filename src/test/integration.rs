use geo_0_31::coord;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bitonic::pass_count;
use crate::morton::morton_key;
use crate::surface::{ExecutionSurface, HostSurface};
use crate::test::faulty::{Fault, FaultySurface};
use crate::test::reference;
use crate::{
    BitonicSorter, MinMaxReducer, MortonSortError, Point, Range, RangeSource, SortConfig, SortPipeline,
    SortedPoints,
};

fn check_sorted<N: crate::DeviceNum>(input: &[Point<N>], sorted: &SortedPoints<N>) {
    assert_eq!(sorted.points.len(), input.len());
    assert!(sorted.keys.windows(2).all(|w| w[0] <= w[1]));

    let (min, max): (f64, f64) = (sorted.range.min.into(), sorted.range.max.into());
    for (point, key) in sorted.points.iter().zip(&sorted.keys) {
        assert_eq!(*key, morton_key(point, min, max), "key moved without its point");
    }

    let bits = |points: &[Point<N>]| {
        let mut words: Vec<[u32; 2]> = points.iter().map(|p| bytemuck::cast(*p)).collect();
        words.sort_unstable();
        words
    };
    assert_eq!(bits(&sorted.points), bits(input), "output is not a permutation");
}

#[test]
fn grid_sorts_into_z_order() {
    for side in [4u16, 8] {
        let mut pipeline = SortPipeline::new(HostSurface::new());
        let grid = Point::<f32>::grid(side);
        let sorted = pipeline.sort(&grid).unwrap();
        assert_eq!(sorted.points, reference::z_order::<f32>(side), "side {}", side);
        assert_eq!(sorted.range, Range::new(0.0, (side - 1) as f32));

        let grid = Point::<i32>::grid(side);
        let config = SortConfig::new()
            .with_group_size(4)
            .with_range(RangeSource::BoundingBox);
        let mut pipeline = SortPipeline::new_with_config(HostSurface::new(), config).unwrap();
        let sorted = pipeline.sort(&grid).unwrap();
        assert_eq!(sorted.points, reference::z_order::<i32>(side), "side {}", side);
    }
}

#[test]
fn bounding_box_of_grid() {
    let mut pipeline = SortPipeline::new(HostSurface::new());
    let grid = Point::<f32>::grid(4);
    let extrema = pipeline.extrema(&grid).unwrap();
    assert_eq!(grid[extrema.min_x], Point::new(0.0, 0.0));
    assert_eq!(grid[extrema.min_y], Point::new(0.0, 0.0));
    assert_eq!(extrema.max_x, 3);
    assert_eq!(extrema.max_y, 12);
    assert_eq!(
        extrema.bounds(&grid).unwrap(),
        (Point::new(0.0, 0.0), Point::new(3.0, 3.0))
    );
}

#[test]
fn explicit_range_sorts_scenario() {
    let points: Vec<Point<f32>> = [7.0, 3.0, 5.0, 1.0, 6.0, 0.0, 4.0, 2.0]
        .iter()
        .map(|&x| Point::new(x, 0.0))
        .collect();
    let config = SortConfig::new().with_range(RangeSource::Explicit(Range::new(0.0, 8.0)));
    let mut pipeline = SortPipeline::new_with_config(HostSurface::new(), config).unwrap();
    let sorted = pipeline.sort(&points).unwrap();
    let xs: Vec<f32> = sorted.points.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    check_sorted(&points, &sorted);
}

#[test]
fn random_points() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut surface = HostSurface::new_with_max_group_size(64);
    for shift in [1, 5, 10, 12] {
        let points: Vec<Point<f32>> = (0..1 << shift)
            .map(|_| Point::new(rng.gen_range(-180.0..180.0), rng.gen_range(-90.0..90.0)))
            .collect();
        let sorted = SortPipeline::new(&mut surface).sort(&points).unwrap();
        check_sorted(&points, &sorted);
        // sorting twice changes no key
        let again = SortPipeline::new(&mut surface).sort(&sorted.points).unwrap();
        assert_eq!(again.keys, sorted.keys);
        check_sorted(&points, &again);
    }
    assert_eq!(surface.live_buffers(), 0);
}

#[test]
fn geo_coords() {
    let coords = vec![
        coord! { x: 10.0f32, y: 10.0 },
        coord! { x: -10.0, y: -10.0 },
        coord! { x: 10.0, y: -10.0 },
        coord! { x: -10.0, y: 10.0 },
    ];
    let mut pipeline = SortPipeline::new(HostSurface::new());
    let sorted = pipeline.sort_coords(coords).unwrap();
    assert_eq!(
        sorted.points,
        vec![
            Point::new(-10.0, -10.0),
            Point::new(10.0, -10.0),
            Point::new(-10.0, 10.0),
            Point::new(10.0, 10.0),
        ]
    );
}

#[test]
fn dispatch_count() {
    // one reduction pass, one key pass, then the bitonic network
    let points = Point::<i32>::grid(4);
    let mut surface = HostSurface::new();
    SortPipeline::new(&mut surface).sort(&points).unwrap();
    assert_eq!(surface.completed_dispatches(), 2 + pass_count(16));
}

#[test]
fn any_failure_leaves_nothing_behind() {
    let points = Point::<f32>::grid(4);
    let dispatches = 2 + pass_count(points.len());

    let faults = (0..dispatches)
        .map(Fault::Dispatch)
        .chain([Fault::Await(0), Fault::Await(1), Fault::Download]);
    for fault in faults {
        let mut pipeline = SortPipeline::new(FaultySurface::new(fault));
        let result = pipeline.sort(&points);
        assert!(
            matches!(result, Err(MortonSortError::DeviceFailure(_))),
            "{:?} gave {:?}",
            fault,
            result
        );
        let surface = pipeline.into_inner();
        assert_eq!(surface.inner.live_buffers(), 0, "{:?}", fault);
        assert_eq!(surface.inner.pending_dispatches(), 0, "{:?}", fault);
    }

    // a fault past the last dispatch is never hit
    let mut pipeline = SortPipeline::new(FaultySurface::new(Fault::Dispatch(dispatches)));
    assert!(pipeline.sort(&points).is_ok());
}

#[test]
fn download_before_completion_fails() {
    let mut surface = HostSurface::new();
    let values = surface.upload_slice(&[4u32, 1, 3, 2]).unwrap();
    BitonicSorter::default()
        .sort::<u32, _>(&mut surface, values, 4)
        .unwrap();
    assert!(matches!(
        surface.download(values),
        Err(MortonSortError::DeviceFailure(_))
    ));
    surface.await_completion().unwrap();
    assert_eq!(surface.download_vec::<u32>(values).unwrap(), vec![1, 2, 3, 4]);
}

fn points_strategy() -> impl Strategy<Value = Vec<Point<i32>>> {
    (0usize..9).prop_flat_map(|shift| {
        prop::collection::vec((any::<i16>(), any::<i16>()), 1usize << shift).prop_map(|coords| {
            coords
                .into_iter()
                .map(|(x, y)| Point::new(x.into(), y.into()))
                .collect()
        })
    })
}

fn check_raw_sort<T: crate::DeviceNum>(values: &[T], group_size: usize) {
    let mut sorted = values.to_vec();
    BitonicSorter::new(group_size)
        .unwrap()
        .sort_slice(&mut HostSurface::new(), &mut sorted)
        .unwrap();

    let mut expected = values.to_vec();
    expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(sorted, expected);

    let bits = |values: &[T]| {
        let mut words: Vec<u32> = values.iter().map(|v| bytemuck::cast(*v)).collect();
        words.sort_unstable();
        words
    };
    assert_eq!(bits(&sorted), bits(values), "output is not a permutation");
}

fn values_strategy<T: std::fmt::Debug>(
    element: impl Strategy<Value = T> + Clone,
) -> impl Strategy<Value = Vec<T>> {
    (0usize..=10).prop_flat_map(move |shift| prop::collection::vec(element.clone(), 1usize << shift))
}

proptest! {
    #[test]
    fn prop_bitonic_sorts_f32(
        values in values_strategy(-1.0e6f32..1.0e6),
        group_shift in 0u32..8,
    ) {
        check_raw_sort(&values, 1 << group_shift);
    }

    #[test]
    fn prop_bitonic_sorts_i32(values in values_strategy(any::<i32>()), group_shift in 0u32..8) {
        check_raw_sort(&values, 1 << group_shift);
    }

    #[test]
    fn prop_sort_orders_by_key(points in points_strategy(), group_shift in 0u32..7) {
        let config = SortConfig::new().with_group_size(1 << group_shift);
        let mut pipeline = SortPipeline::new_with_config(HostSurface::new(), config).unwrap();
        let first = points[0].x;
        let constant = points.iter().all(|p| p.x == first && p.y == first);
        match pipeline.sort(&points) {
            Ok(sorted) => {
                prop_assert!(!constant);
                check_sorted(&points, &sorted);
            }
            Err(err) => {
                prop_assert!(constant);
                let is_degenerate = matches!(err, MortonSortError::DegenerateRange { .. });
                prop_assert!(is_degenerate);
            }
        }
    }

    #[test]
    fn prop_min_max_matches_reference(
        values in prop::collection::vec(-1.0e6f32..1.0e6, 1..600),
        group_shift in 0u32..9,
    ) {
        let mut surface = HostSurface::new();
        let found = MinMaxReducer::new(1 << group_shift)
            .unwrap()
            .reduce_slice(&mut surface, &values)
            .unwrap();
        prop_assert_eq!((found.min, found.max), reference::min_max(&values));
    }
}
