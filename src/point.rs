//! The 2-D point type that flows through the pipeline.

use geo_traits::CoordTrait;

use crate::r#type::DeviceNum;

/// A single 2-D point.
///
/// The layout is `#[repr(C)]` so that a `&[Point<N>]` can be uploaded to an execution surface as
/// raw bytes, and so that it can be viewed as a flat `x0, y0, x1, y1, ...` scalar array.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point<N: DeviceNum> {
    pub x: N,
    pub y: N,
}

// SAFETY: two fields of the same four-byte `Pod` scalar under `repr(C)` leave no padding, and
// every bit pattern of the scalar is valid.
unsafe impl<N: DeviceNum> bytemuck::Zeroable for Point<N> {}
unsafe impl<N: DeviceNum> bytemuck::Pod for Point<N> {}

impl<N: DeviceNum> Point<N> {
    /// The number of 32-bit words occupied by one point in a device buffer.
    pub const WORDS: usize = 2;

    pub fn new(x: N, y: N) -> Self {
        Self { x, y }
    }

    /// Copy the coordinates out of any [`CoordTrait`] implementation.
    pub fn from_coord(coord: &impl CoordTrait<T = N>) -> Self {
        Self::new(coord.x(), coord.y())
    }

    /// Generate a `side * side` grid of points with integer coordinates `0..side`.
    ///
    /// Points are laid out row-major: the point at index `y * side + x` is `(x, y)`.
    pub fn grid(side: u16) -> Vec<Self> {
        let mut points = Vec::with_capacity(side as usize * side as usize);
        for y in 0..side {
            for x in 0..side {
                // `NumCast` also provides a `from`
                points.push(Self::new(<N as From<u16>>::from(x), <N as From<u16>>::from(y)));
            }
        }
        points
    }

    /// Access coordinate `axis` (0 for x, 1 for y).
    #[inline]
    pub fn axis(&self, axis: usize) -> N {
        if axis == 0 {
            self.x
        } else {
            self.y
        }
    }
}

impl<N: DeviceNum> CoordTrait for Point<N> {
    type T = N;

    fn dim(&self) -> geo_traits::Dimensions {
        geo_traits::Dimensions::Xy
    }

    fn x(&self) -> Self::T {
        self.x
    }

    fn y(&self) -> Self::T {
        self.y
    }

    fn nth_or_panic(&self, n: usize) -> Self::T {
        match n {
            0 => self.x,
            1 => self.y,
            _ => panic!("Invalid index of coord"),
        }
    }
}

/// View a slice of points as the flat `x0, y0, x1, y1, ...` scalars.
#[inline]
pub fn flatten<N: DeviceNum>(points: &[Point<N>]) -> &[N] {
    bytemuck::cast_slice(points)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grid_is_row_major() {
        let grid = Point::<i32>::grid(4);
        assert_eq!(grid.len(), 16);
        assert_eq!(grid[0], Point::new(0, 0));
        assert_eq!(grid[3], Point::new(3, 0));
        assert_eq!(grid[4], Point::new(0, 1));
        assert_eq!(grid[15], Point::new(3, 3));
    }

    #[test]
    fn flatten_interleaves_axes() {
        let points = vec![Point::new(1.0f32, 2.0), Point::new(3.0, 4.0)];
        assert_eq!(flatten(&points), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn from_geo_coord() {
        let coord = geo_0_31::coord! { x: 1.5f32, y: -2.0 };
        let point = Point::from_coord(&coord);
        assert_eq!(point, Point::new(1.5, -2.0));
        assert_eq!(point.nth_or_panic(1), -2.0);
    }
}
