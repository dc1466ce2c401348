use std::fmt::{Debug, Display};

use num_traits::{Num, NumCast, ToPrimitive};

/// A trait for scalar types that can live in a device buffer.
///
/// This covers point coordinates, sort keys and reduction inputs. Every implementor is four bytes
/// wide so that buffers can be stored as 32-bit words on every surface.
///
/// This trait is sealed and cannot be implemented for external types, because each implementor
/// needs a matching kernel instantiation on the execution surface.
pub trait DeviceNum:
    private::Sealed
    + Num
    + NumCast
    + ToPrimitive
    + PartialOrd
    + Into<f64>
    + From<u16>
    + Debug
    + Send
    + Sync
    + bytemuck::Pod
{
    /// The tag sent to the execution surface to select the kernel instantiation.
    const NUMERIC_TYPE: NumericType;
}

impl DeviceNum for i32 {
    const NUMERIC_TYPE: NumericType = NumericType::Int32;
}

impl DeviceNum for u32 {
    const NUMERIC_TYPE: NumericType = NumericType::UInt32;
}

impl DeviceNum for f32 {
    const NUMERIC_TYPE: NumericType = NumericType::Float32;
}

/// An enum over the scalar types a kernel can be instantiated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    Int32,
    UInt32,
    Float32,
}

impl Display for NumericType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NumericType::Int32 => "int32",
            NumericType::UInt32 => "uint32",
            NumericType::Float32 => "float32",
        };
        f.write_str(name)
    }
}

// https://rust-lang.github.io/api-guidelines/future-proofing.html#sealed-traits-protect-against-downstream-implementations-c-sealed
mod private {
    pub trait Sealed {}

    impl Sealed for i32 {}
    impl Sealed for u32 {}
    impl Sealed for f32 {}
}
