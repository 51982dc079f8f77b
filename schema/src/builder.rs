use crate::{
    field_index_to_offset, padding_bytes, SOffset, Scalar, UOffset, VOffset, SIZE_UOFFSET,
    SIZE_VOFFSET,
};

/// A tablewire buffer meant for writing.
///
/// The buffer grows toward lower addresses: every `push_*` prepends to the
/// finished region, so offsets handed out earlier always point at data behind
/// the write head. Offsets are measured from the end of the buffer, which
/// never moves.
///
/// Example usage:
///
/// ```
/// use tablewire_schema::Builder;
///
/// let mut b = Builder::new();
/// b.push_element::<u16>(2);
/// b.push_element::<u8>(1);
/// assert_eq!(b.data(), [1, 2, 0]);
/// ```
pub struct Builder {
    buf: Vec<u8>,
    head: usize,
    field_locs: Vec<FieldLoc>,
    vtables: Vec<UOffset>,
    minalign: usize,
}

/// A field recorded for the vtable of the table under construction.
#[derive(Debug, Clone, Copy)]
struct FieldLoc {
    off: UOffset,
    slot: VOffset,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            buf: vec![0; 64],
            head: 64,
            field_locs: Vec::new(),
            vtables: Vec::new(),
            minalign: 1,
        }
    }

    /// Reset the builder so it can produce a fresh buffer.
    pub fn clear(&mut self) {
        self.head = self.buf.len();
        self.field_locs.clear();
        self.vtables.clear();
        self.minalign = 1;
    }

    /// Number of bytes written so far.
    pub fn size(&self) -> UOffset {
        (self.buf.len() - self.head) as UOffset
    }

    /// Everything written so far, lowest address first.
    pub fn data(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    fn make_space(&mut self, len: usize) {
        if self.head >= len {
            return;
        }
        let used = self.buf.len() - self.head;
        let mut new_len = self.buf.len().max(64);
        while new_len - used < len {
            new_len *= 2;
        }
        let mut new_buf = vec![0u8; new_len];
        new_buf[new_len - used..].copy_from_slice(&self.buf[self.head..]);
        self.buf = new_buf;
        self.head = new_len - used;
    }

    fn fill(&mut self, len: usize) {
        self.make_space(len);
        self.head -= len;
        for byte in &mut self.buf[self.head..self.head + len] {
            *byte = 0;
        }
    }

    /// Write `len` zero bytes.
    pub fn pad(&mut self, len: usize) {
        self.fill(len);
    }

    /// Pad so the next write lands on a multiple of `elem_size`.
    pub fn align(&mut self, elem_size: usize) {
        if elem_size > self.minalign {
            self.minalign = elem_size;
        }
        let pad = padding_bytes(self.size() as usize, elem_size);
        self.fill(pad);
    }

    /// Pad so that after `len` more bytes the buffer is aligned to
    /// `alignment`.
    fn pre_align(&mut self, len: usize, alignment: usize) {
        if alignment > self.minalign {
            self.minalign = alignment;
        }
        let pad = padding_bytes(self.size() as usize + len, alignment);
        self.fill(pad);
    }

    /// Prepend a raw byte slice.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.make_space(bytes.len());
        self.head -= bytes.len();
        self.buf[self.head..self.head + bytes.len()].copy_from_slice(bytes);
    }

    /// Discard the most recently written `len` bytes.
    pub fn pop_bytes(&mut self, len: usize) {
        debug_assert!(len <= self.size() as usize);
        self.head += len;
    }

    /// Prepend one aligned scalar and return its offset.
    pub fn push_element<T: Scalar>(&mut self, value: T) -> UOffset {
        self.align(T::SIZE);
        self.make_space(T::SIZE);
        self.head -= T::SIZE;
        value.write_le(&mut self.buf[self.head..]);
        self.size()
    }

    fn track_field(&mut self, slot: VOffset, off: UOffset) {
        self.field_locs.push(FieldLoc { off, slot });
    }

    /// Write a scalar field of the table under construction. The slot is
    /// suppressed entirely when the value equals its default.
    pub fn add_element<T: Scalar>(&mut self, slot: VOffset, value: T, default: T) {
        if value == default {
            return;
        }
        let off = self.push_element(value);
        self.track_field(slot, off);
    }

    /// Convert the absolute offset `off` into a forward offset relative to
    /// the `UOffset` about to be written.
    pub fn refer_to(&mut self, off: UOffset) -> UOffset {
        self.align(SIZE_UOFFSET);
        debug_assert!(off <= self.size());
        self.size() - off + SIZE_UOFFSET as UOffset
    }

    /// Write an offset field referencing previously built data.
    pub fn add_offset(&mut self, slot: VOffset, off: UOffset) {
        if off == 0 {
            return;
        }
        let rel = self.refer_to(off);
        self.add_element::<UOffset>(slot, rel, 0);
    }

    /// Record a field whose data was just written inline at `here`.
    pub fn add_struct_offset(&mut self, slot: VOffset, here: UOffset) {
        self.track_field(slot, here);
    }

    /// Drop the fields tracked for the current frame without emitting a
    /// vtable. Struct frames and vectors have no vtable.
    pub fn clear_offsets(&mut self) {
        self.field_locs.clear();
    }

    pub fn start_table(&mut self) -> UOffset {
        debug_assert!(self.field_locs.is_empty());
        self.size()
    }

    /// Finish the table begun at `start`: write its vtable (or reuse an
    /// identical one emitted earlier) and the signed offset that ties the
    /// table to it. Returns the table's offset.
    pub fn end_table(&mut self, start: UOffset, fieldcount: VOffset) -> UOffset {
        let vtable_loc = self.push_element::<SOffset>(0);
        self.fill(fieldcount as usize * SIZE_VOFFSET);
        let table_size = vtable_loc - start;
        debug_assert!(table_size < 0x10000);
        self.push_element::<VOffset>(table_size as VOffset);
        self.push_element::<VOffset>(field_index_to_offset(fieldcount));
        let locs = std::mem::take(&mut self.field_locs);
        for loc in &locs {
            let pos = (vtable_loc - loc.off) as VOffset;
            let at = self.head + loc.slot as usize;
            debug_assert_eq!(VOffset::read_le(&self.buf[at..]), 0, "field set twice");
            pos.write_le(&mut self.buf[at..]);
        }
        let vt_len = VOffset::read_le(&self.buf[self.head..]) as usize;
        let mut vt_use = self.size();
        for &prior in &self.vtables {
            let at = self.buf.len() - prior as usize;
            let prior_len = VOffset::read_le(&self.buf[at..]) as usize;
            if vt_len == prior_len
                && self.buf[self.head..self.head + vt_len] == self.buf[at..at + prior_len]
            {
                vt_use = prior;
                break;
            }
        }
        if vt_use == self.size() {
            self.vtables.push(vt_use);
        } else {
            self.pop_bytes((self.size() - vtable_loc) as usize);
        }
        let at = self.buf.len() - vtable_loc as usize;
        (vt_use as SOffset - vtable_loc as SOffset).write_le(&mut self.buf[at..]);
        vtable_loc
    }

    /// Begin a fixed struct frame aligned to `align`.
    pub fn start_struct(&mut self, align: usize) -> UOffset {
        self.align(align);
        self.size()
    }

    pub fn end_struct(&mut self) -> UOffset {
        self.size()
    }

    /// Begin a vector that will hold `bytes` bytes of element data aligned
    /// to `align`; the length prefix is written by `end_vector`.
    pub fn start_vector(&mut self, bytes: usize, align: usize) -> UOffset {
        debug_assert!(self.field_locs.is_empty());
        self.pre_align(bytes, SIZE_UOFFSET);
        self.pre_align(bytes, align);
        self.size()
    }

    /// Write the vector length prefix and return the vector's offset.
    pub fn end_vector(&mut self, count: usize) -> UOffset {
        self.push_element::<UOffset>(count as UOffset)
    }

    /// Write a length-prefixed, zero-terminated string and return its offset.
    pub fn create_string(&mut self, value: &str) -> UOffset {
        debug_assert!(self.field_locs.is_empty());
        self.pre_align(value.len() + 1, SIZE_UOFFSET);
        self.fill(1);
        self.push_bytes(value.as_bytes());
        self.push_element::<UOffset>(value.len() as UOffset)
    }

    /// Align the whole buffer and write the root reference, completing it.
    pub fn finish(&mut self, root: UOffset) {
        let minalign = self.minalign;
        self.pre_align(SIZE_UOFFSET, minalign);
        let rel = self.refer_to(root);
        self.push_element::<UOffset>(rel);
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

#[test]
fn push_element_aligns() {
    let mut b = Builder::new();
    b.push_element::<u8>(1);
    b.push_element::<u16>(2);
    assert_eq!(b.data(), [2, 0, 0, 1]);
}

#[test]
fn push_and_pop_bytes() {
    let mut b = Builder::new();
    b.push_bytes(&[4, 5]);
    b.push_bytes(&[1, 2, 3]);
    assert_eq!(b.data(), [1, 2, 3, 4, 5]);
    b.pop_bytes(3);
    assert_eq!(b.data(), [4, 5]);
}

#[test]
fn pad_writes_zeros() {
    let mut b = Builder::new();
    b.push_element::<u8>(7);
    b.pad(2);
    assert_eq!(b.data(), [0, 0, 7]);
}

#[test]
fn grows_past_initial_capacity() {
    let mut b = Builder::new();
    for i in 0..100u32 {
        b.push_element::<u32>(i);
    }
    assert_eq!(b.size(), 400);
    assert_eq!(&b.data()[..4], [99, 0, 0, 0]);
    assert_eq!(&b.data()[396..], [0, 0, 0, 0]);
}

#[test]
fn create_string_layout() {
    let mut b = Builder::new();
    let off = b.create_string("abc");
    assert_eq!(off, 8);
    assert_eq!(b.data(), [3, 0, 0, 0, 97, 98, 99, 0]);
}

#[test]
fn clear_resets() {
    let mut b = Builder::new();
    b.create_string("abc");
    b.clear();
    assert_eq!(b.size(), 0);
    let off = b.create_string("abc");
    assert_eq!(off, 8);
    assert_eq!(b.data(), [3, 0, 0, 0, 97, 98, 99, 0]);
}

#[test]
fn table_layout() {
    let mut b = Builder::new();
    let start = b.start_table();
    b.add_element::<i16>(field_index_to_offset(0), 2, 0);
    let root = b.end_table(start, 1);
    assert_eq!(root, 8);
    b.finish(root);
    #[rustfmt::skip]
    assert_eq!(
        b.data(),
        [
            12, 0, 0, 0,      // root uoffset
            0, 0,             // alignment padding
            6, 0, 8, 0, 6, 0, // vtable: length, table length, slot 0
            6, 0, 0, 0,       // table: soffset to vtable
            0, 0,             // alignment padding
            2, 0,             // the field
        ]
    );
}

#[test]
fn default_valued_field_is_suppressed() {
    let mut b = Builder::new();
    let start = b.start_table();
    b.add_element::<i16>(field_index_to_offset(0), 7, 7);
    let root = b.end_table(start, 1);
    b.finish(root);
    #[rustfmt::skip]
    assert_eq!(
        b.data(),
        [
            12, 0, 0, 0,      // root uoffset
            0, 0,             // alignment padding
            6, 0, 4, 0, 0, 0, // vtable: slot 0 empty
            6, 0, 0, 0,       // table: soffset to vtable
        ]
    );
}

#[test]
fn identical_vtables_are_shared() {
    let mut b = Builder::new();
    let s1 = b.start_table();
    b.add_element::<u32>(4, 11, 0);
    let t1 = b.end_table(s1, 1);
    assert_eq!(t1, 8);
    b.pad(2);
    let s2 = b.start_table();
    b.add_element::<u32>(4, 22, 0);
    let t2 = b.end_table(s2, 1);
    assert_eq!(t2, 24);
    // the second table reuses the first vtable via a negative soffset
    assert_eq!(b.size(), 24);
    let at = b.data().len() - t2 as usize;
    assert_eq!(SOffset::read_le(&b.data()[at..]), -10);
}

#[test]
fn vector_layout() {
    let mut b = Builder::new();
    b.start_vector(3 * 2, 2);
    b.push_element::<u16>(30);
    b.push_element::<u16>(20);
    b.push_element::<u16>(10);
    let off = b.end_vector(3);
    assert_eq!(off, 12);
    assert_eq!(b.data(), [3, 0, 0, 0, 10, 0, 20, 0, 30, 0, 0, 0]);
}

#[test]
fn add_offset_is_relative() {
    let mut b = Builder::new();
    let s = b.create_string("hi");
    let start = b.start_table();
    b.add_offset(field_index_to_offset(0), s);
    let root = b.end_table(start, 1);
    b.finish(root);
    // read the field back through its vtable
    let data = b.data();
    let root_pos = UOffset::read_le(data) as usize;
    let soffset = SOffset::read_le(&data[root_pos..]);
    let vtable = (root_pos as i64 - soffset as i64) as usize;
    let field = VOffset::read_le(&data[vtable + 4..]) as usize;
    let at = root_pos + field;
    let string_pos = at + UOffset::read_le(&data[at..]) as usize;
    let len = UOffset::read_le(&data[string_pos..]) as usize;
    assert_eq!(&data[string_pos + 4..string_pos + 4 + len], b"hi");
}
