//! Bridging between typed values and raw message bytes
//!
//! Messages on the wire are plain byte strings. Fixed-size values are carried
//! by copying their in-memory representation, which is only sound for plain
//! fixed-layout data. Types opt into that contract through the unsafe
//! [`FixedSizeValue`] marker trait; the primitive integer and floating point
//! types and fixed-size arrays of them are provided.
//!
//! Decoding validates the byte length exactly: a message whose length differs
//! from the target type's size fails with
//! [`Error::SizeMismatch`](crate::Error::SizeMismatch) instead of being
//! truncated or padded.

use std::mem;
use std::ptr;

use crate::error::{Error, Result};

/// Marker for values that can be sent as their raw byte representation.
///
/// # Safety
///
/// Implementors assert that the type is plain fixed-layout data:
///
/// - it contains no padding bytes, so every byte of its representation is
///   initialized, and
/// - every possible bit pattern of [`SIZE`](FixedSizeValue::SIZE) bytes is a
///   valid value, so decoding arbitrary message bytes cannot produce an
///   invalid value.
///
/// `bool` and `char` do not qualify (most bit patterns are invalid), nor do
/// tuples or `repr(Rust)` structs (layout and padding are unspecified).
pub unsafe trait FixedSizeValue: Copy + 'static {
    /// The stable byte size of the value's representation.
    const SIZE: usize = mem::size_of::<Self>();
}

macro_rules! impl_fixed_size_value {
    ($($ty:ty),*) => {
        $(
        unsafe impl FixedSizeValue for $ty {}
        )*
    };
}

impl_fixed_size_value!(u8, u16, u32, u64, u128, usize);
impl_fixed_size_value!(i8, i16, i32, i64, i128, isize);
impl_fixed_size_value!(f32, f64);

// Arrays of padding-free all-bit-patterns-valid elements are themselves
// padding-free and all-bit-patterns-valid.
unsafe impl<T: FixedSizeValue, const N: usize> FixedSizeValue for [T; N] {}

/// Encodes a fixed-size value into an owned byte buffer of exactly
/// [`T::SIZE`](FixedSizeValue::SIZE) bytes.
pub fn encode<T: FixedSizeValue>(value: &T) -> Vec<u8> {
    let mut bytes = vec![0u8; T::SIZE];
    unsafe {
        ptr::copy_nonoverlapping(value as *const T as *const u8, bytes.as_mut_ptr(), T::SIZE);
    }
    bytes
}

/// Decodes a fixed-size value from message bytes.
///
/// Fails with a size-mismatch error unless `bytes` is exactly
/// [`T::SIZE`](FixedSizeValue::SIZE) bytes long.
pub fn decode<T: FixedSizeValue>(bytes: &[u8]) -> Result<T> {
    if bytes.len() != T::SIZE {
        return Err(Error::SizeMismatch {
            expected: T::SIZE,
            actual: bytes.len(),
        });
    }
    Ok(unsafe { ptr::read_unaligned(bytes.as_ptr() as *const T) })
}
