use crate::{SOffset, Scalar, UOffset, VOffset, SIZE_UOFFSET};

/// Read one scalar at `pos`.
pub fn read_scalar<T: Scalar>(buf: &[u8], pos: usize) -> T {
    T::read_le(&buf[pos..])
}

/// Read access to a table inside a finished buffer.
///
/// A table starts with a signed offset to its vtable; the vtable maps field
/// slots to the field data, with absent fields mapped to zero. The accessors
/// here mirror that layout directly, so they can verify buffers produced by
/// [Builder](crate::Builder) without sharing any code with it.
///
/// Example usage:
///
/// ```
/// use tablewire_schema::{field_index_to_offset, Builder, Table};
///
/// let mut b = Builder::new();
/// let start = b.start_table();
/// b.add_element::<u8>(field_index_to_offset(0), 5, 0);
/// let root = b.end_table(start, 1);
/// b.finish(root);
///
/// let t = Table::root(b.data());
/// assert_eq!(t.scalar::<u8>(field_index_to_offset(0), 0), 5);
/// ```
#[derive(Clone, Copy)]
pub struct Table<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Table<'a> {
    /// The root table of a finished buffer: the leading `UOffset` points at
    /// it.
    pub fn root(buf: &'a [u8]) -> Table<'a> {
        let pos = read_scalar::<UOffset>(buf, 0) as usize;
        Table { buf, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Byte offset of `slot`'s data from the table start, or 0 if absent.
    fn field_offset(&self, slot: VOffset) -> usize {
        let soffset = read_scalar::<SOffset>(self.buf, self.pos);
        let vtable = (self.pos as i64 - soffset as i64) as usize;
        let vtable_len = read_scalar::<VOffset>(self.buf, vtable) as usize;
        if slot as usize >= vtable_len {
            return 0;
        }
        read_scalar::<VOffset>(self.buf, vtable + slot as usize) as usize
    }

    /// Whether the field occupying `slot` is present.
    pub fn present(&self, slot: VOffset) -> bool {
        self.field_offset(slot) != 0
    }

    /// A scalar field, or `default` when the slot was suppressed.
    pub fn scalar<T: Scalar>(&self, slot: VOffset, default: T) -> T {
        match self.field_offset(slot) {
            0 => default,
            off => read_scalar::<T>(self.buf, self.pos + off),
        }
    }

    /// Position of the data referenced by an offset field.
    fn indirect(&self, slot: VOffset) -> Option<usize> {
        match self.field_offset(slot) {
            0 => None,
            off => {
                let at = self.pos + off;
                Some(at + read_scalar::<UOffset>(self.buf, at) as usize)
            }
        }
    }

    /// Position of an inline struct field.
    pub fn struct_pos(&self, slot: VOffset) -> Option<usize> {
        match self.field_offset(slot) {
            0 => None,
            off => Some(self.pos + off),
        }
    }

    pub fn table(&self, slot: VOffset) -> Option<Table<'a>> {
        self.indirect(slot).map(|pos| Table { buf: self.buf, pos })
    }

    pub fn string(&self, slot: VOffset) -> Option<&'a str> {
        self.indirect(slot).map(|pos| read_string(self.buf, pos))
    }

    pub fn vector(&self, slot: VOffset) -> Option<Vector<'a>> {
        self.indirect(slot).map(|pos| Vector {
            buf: self.buf,
            pos: pos + SIZE_UOFFSET,
            len: read_scalar::<UOffset>(self.buf, pos) as usize,
        })
    }
}

fn read_string(buf: &[u8], pos: usize) -> &str {
    let len = read_scalar::<UOffset>(buf, pos) as usize;
    std::str::from_utf8(&buf[pos + SIZE_UOFFSET..pos + SIZE_UOFFSET + len]).unwrap_or("")
}

/// A typed view of a vector's elements.
#[derive(Clone, Copy)]
pub struct Vector<'a> {
    buf: &'a [u8],
    pos: usize,
    len: usize,
}

impl<'a> Vector<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn scalar<T: Scalar>(&self, index: usize) -> T {
        read_scalar::<T>(self.buf, self.pos + index * T::SIZE)
    }

    /// Position of the `index`-th inline struct of `struct_size` bytes.
    pub fn struct_pos(&self, index: usize, struct_size: usize) -> usize {
        self.pos + index * struct_size
    }

    pub fn table(&self, index: usize) -> Table<'a> {
        let at = self.pos + index * SIZE_UOFFSET;
        Table {
            buf: self.buf,
            pos: at + read_scalar::<UOffset>(self.buf, at) as usize,
        }
    }

    pub fn string(&self, index: usize) -> &'a str {
        let at = self.pos + index * SIZE_UOFFSET;
        read_string(self.buf, at + read_scalar::<UOffset>(self.buf, at) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field_index_to_offset, Builder};

    #[test]
    fn absent_field_yields_default() {
        let mut b = Builder::new();
        let start = b.start_table();
        b.add_element::<i32>(field_index_to_offset(0), 7, 7);
        let root = b.end_table(start, 1);
        b.finish(root);

        let t = Table::root(b.data());
        assert!(!t.present(field_index_to_offset(0)));
        assert_eq!(t.scalar::<i32>(field_index_to_offset(0), 7), 7);
    }

    #[test]
    fn scalar_round_trip() {
        let mut b = Builder::new();
        let start = b.start_table();
        b.add_element::<i64>(field_index_to_offset(0), -9, 0);
        b.add_element::<u8>(field_index_to_offset(1), 3, 0);
        let root = b.end_table(start, 2);
        b.finish(root);

        let t = Table::root(b.data());
        assert_eq!(t.scalar::<i64>(field_index_to_offset(0), 0), -9);
        assert_eq!(t.scalar::<u8>(field_index_to_offset(1), 0), 3);
    }

    #[test]
    fn string_round_trip() {
        let mut b = Builder::new();
        let s = b.create_string("🍕 and more");
        let start = b.start_table();
        b.add_offset(field_index_to_offset(0), s);
        let root = b.end_table(start, 1);
        b.finish(root);

        let t = Table::root(b.data());
        assert_eq!(t.string(field_index_to_offset(0)), Some("🍕 and more"));
        assert_eq!(t.string(field_index_to_offset(1)), None);
    }

    #[test]
    fn vector_round_trip() {
        let mut b = Builder::new();
        b.start_vector(3 * 2, 2);
        b.push_element::<u16>(30);
        b.push_element::<u16>(20);
        b.push_element::<u16>(10);
        let v = b.end_vector(3);
        let start = b.start_table();
        b.add_offset(field_index_to_offset(0), v);
        let root = b.end_table(start, 1);
        b.finish(root);

        let t = Table::root(b.data());
        let xs = match t.vector(field_index_to_offset(0)) {
            Some(xs) => xs,
            None => panic!("vector missing"),
        };
        assert_eq!(xs.len(), 3);
        assert_eq!(xs.scalar::<u16>(0), 10);
        assert_eq!(xs.scalar::<u16>(1), 20);
        assert_eq!(xs.scalar::<u16>(2), 30);
    }

    #[test]
    fn nested_table_round_trip() {
        let mut b = Builder::new();
        let start = b.start_table();
        b.add_element::<u32>(field_index_to_offset(0), 42, 0);
        let inner = b.end_table(start, 1);
        let start = b.start_table();
        b.add_offset(field_index_to_offset(0), inner);
        let root = b.end_table(start, 1);
        b.finish(root);

        let t = Table::root(b.data());
        let inner = match t.table(field_index_to_offset(0)) {
            Some(inner) => inner,
            None => panic!("nested table missing"),
        };
        assert_eq!(inner.scalar::<u32>(field_index_to_offset(0), 0), 42);
    }
}
