//! Big-endian, bounds-checked reading and writing of primitive values.
//!
//! Every multi-byte quantity in a class file and in a JVM instruction stream is stored
//! big-endian. This module provides the primitive helpers the codecs are built on:
//!
//! - [`crate::file::io::ClassIO`] - conversion between primitive types and their byte arrays
//! - [`crate::file::io::read_be`] / [`crate::file::io::read_be_at`] - bounds-checked reads
//! - [`crate::file::io::write_be_at`] - bounds-checked in-place writes
//! - [`crate::file::io::push_be`] - append to a growing output buffer
//!
//! # Examples
//!
//! ```rust
//! use mcsc::file::io::{read_be_at, push_be};
//!
//! let mut out = Vec::new();
//! push_be(&mut out, 0xCAFE_BABEu32);
//! push_be(&mut out, 52u16);
//!
//! let mut offset = 0;
//! let magic: u32 = read_be_at(&out, &mut offset)?;
//! let major: u16 = read_be_at(&out, &mut offset)?;
//! assert_eq!((magic, major, offset), (0xCAFE_BABE, 52, 6));
//! # Ok::<(), mcsc::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All reading and in-place writing functions return [`crate::Error::OutOfBounds`] if the
//! buffer is too short for the requested operation.

use crate::Result;

/// Conversion between a primitive type and its big-endian byte representation.
pub trait ClassIO: Sized {
    /// Fixed-size byte array for this type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $len];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_class_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
);

/// Reads a value of type `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_be<T: ClassIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Reads a value of type `T` at `offset` and advances the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
///
/// # Examples
///
/// ```rust
/// use mcsc::file::io::read_be_at;
///
/// let data = [0x00, 0x01, 0x00, 0x02];
/// let mut offset = 0;
///
/// let first: u16 = read_be_at(&data, &mut offset)?;
/// let second: u16 = read_be_at(&data, &mut offset)?;
/// assert_eq!((first, second, offset), (1, 2, 4));
/// # Ok::<(), mcsc::Error>(())
/// ```
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or(out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(T::from_be_bytes(read))
}

/// Writes `value` at `offset` and advances the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit into `data`.
pub fn write_be_at<T: ClassIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_be_bytes();
    let bytes = bytes.as_ref();
    let end = offset
        .checked_add(bytes.len())
        .ok_or(out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

/// Appends `value` in big-endian byte order to `out`.
pub fn push_be<T: ClassIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_be_bytes().as_ref());
}
