//! Runtime support for the tablewire binary format.
//!
//! A tablewire buffer is built back-to-front: children are written before the
//! parents that reference them, so every offset points at data that already
//! exists. This crate provides the write side ([Builder](builder::Builder))
//! and the read side ([Table](table::Table)) of that format.
//!
//! ```
//! use tablewire_schema::{field_index_to_offset, Builder, Table};
//!
//! let mut b = Builder::new();
//! let start = b.start_table();
//! b.add_element::<i16>(field_index_to_offset(0), 2, 0);
//! let root = b.end_table(start, 1);
//! b.finish(root);
//!
//! let table = Table::root(b.data());
//! assert_eq!(table.scalar::<i16>(field_index_to_offset(0), 0), 2);
//! ```

pub mod builder;
pub mod table;

pub use builder::*;
pub use table::*;

/// Unsigned offset, the general currency for references inside a buffer.
pub type UOffset = u32;
/// Signed offset, used by tables to locate their vtable in either direction.
pub type SOffset = i32;
/// Narrow offset, used inside vtables.
pub type VOffset = u16;

pub const SIZE_UOFFSET: usize = 4;
pub const SIZE_SOFFSET: usize = 4;
pub const SIZE_VOFFSET: usize = 2;

/// Scalars that can be stored directly in a buffer, little-endian.
pub trait Scalar: Copy + PartialEq {
    const SIZE: usize;
    fn write_le(self, out: &mut [u8]);
    fn read_le(src: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn write_le(self, out: &mut [u8]) {
                out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
            }
            fn read_le(src: &[u8]) -> Self {
                let mut bytes = [0u8; std::mem::size_of::<$t>()];
                bytes.copy_from_slice(&src[..Self::SIZE]);
                <$t>::from_le_bytes(bytes)
            }
        }
    )*};
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Scalar for bool {
    const SIZE: usize = 1;
    fn write_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
    fn read_le(src: &[u8]) -> Self {
        src[0] != 0
    }
}

/// Zero bytes needed after `buf_size` bytes to reach a multiple of
/// `scalar_size`, which must be a power of two.
pub fn padding_bytes(buf_size: usize, scalar_size: usize) -> usize {
    (!buf_size).wrapping_add(1) & (scalar_size - 1)
}

/// Canonical vtable slot of the `index`-th field. The first two slots of a
/// vtable hold the vtable length and the table length.
pub fn field_index_to_offset(index: VOffset) -> VOffset {
    (index + 2) * SIZE_VOFFSET as VOffset
}

#[test]
fn padding() {
    assert_eq!(padding_bytes(0, 4), 0);
    assert_eq!(padding_bytes(1, 4), 3);
    assert_eq!(padding_bytes(2, 4), 2);
    assert_eq!(padding_bytes(3, 4), 1);
    assert_eq!(padding_bytes(4, 4), 0);
    assert_eq!(padding_bytes(7, 8), 1);
    assert_eq!(padding_bytes(17, 1), 0);
}

#[test]
fn vtable_slots() {
    assert_eq!(field_index_to_offset(0), 4);
    assert_eq!(field_index_to_offset(1), 6);
    assert_eq!(field_index_to_offset(2), 8);
}
