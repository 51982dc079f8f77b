use std::collections::HashMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tablewire_schema::{padding_bytes, VOffset, SIZE_UOFFSET};

/// Arena id of a struct or table definition in the parser's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StructId(pub usize);

/// Arena id of an enum or union definition in the parser's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnumId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BaseType {
    None,
    /// The tag of a union field, an unsigned byte.
    UType,
    Bool,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    String,
    Vector,
    Struct,
    Union,
}

impl BaseType {
    /// Inline size in bytes. Offset-valued types (strings, vectors, tables,
    /// unions) take one `UOffset`.
    pub fn size(self) -> usize {
        use BaseType::*;
        match self {
            None | UType | Bool | Byte | UByte => 1,
            Short | UShort => 2,
            Int | UInt | Float => 4,
            Long | ULong | Double => 8,
            String | Vector | Struct | Union => SIZE_UOFFSET,
        }
    }

    pub fn is_scalar(self) -> bool {
        use BaseType::*;
        matches!(
            self,
            UType | Bool | Byte | UByte | Short | UShort | Int | UInt | Long | ULong | Float
                | Double
        )
    }

    pub fn is_integer(self) -> bool {
        use BaseType::*;
        matches!(
            self,
            UType | Byte | UByte | Short | UShort | Int | UInt | Long | ULong
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BaseType::Float | BaseType::Double)
    }

    /// The name used in schema text and diagnostics.
    pub fn name(self) -> &'static str {
        use BaseType::*;
        match self {
            None => "none",
            UType => "utype",
            Bool => "bool",
            Byte => "byte",
            UByte => "ubyte",
            Short => "short",
            UShort => "ushort",
            Int => "int",
            UInt => "uint",
            Long => "long",
            ULong => "ulong",
            Float => "float",
            Double => "double",
            String => "string",
            Vector => "vector",
            Struct => "struct",
            Union => "union",
        }
    }
}

/// A resolved schema type: the base type plus, for vectors, the element base,
/// and registry ids where the type refers to a user definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Type {
    pub base: BaseType,
    pub element: BaseType,
    pub struct_def: Option<StructId>,
    pub enum_def: Option<EnumId>,
}

impl Type {
    pub fn new(base: BaseType) -> Type {
        Type {
            base,
            element: BaseType::None,
            struct_def: None,
            enum_def: None,
        }
    }

    /// The element type of a vector.
    pub fn vector_type(&self) -> Type {
        Type {
            base: self.element,
            element: BaseType::None,
            struct_def: self.struct_def,
            enum_def: self.enum_def,
        }
    }
}

/// A parsed constant: its type, the canonical decimal form of the bits to
/// emit, and the slot it belongs to. Keeping scalars and offsets in one
/// stringly form lets default comparison share a single code path.
#[derive(Debug, Clone, Serialize)]
pub struct Value {
    pub ty: Type,
    pub constant: String,
    pub offset: VOffset,
}

impl Default for Value {
    fn default() -> Value {
        Value {
            ty: Type::new(BaseType::None),
            constant: "0".to_owned(),
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub value: Value,
    /// Bytes of padding emitted after this field inside a fixed struct.
    pub padding: usize,
    pub deprecated: bool,
    pub doc: String,
    pub attributes: SymbolTable<Value>,
}

impl FieldDef {
    pub fn new(name: &str) -> FieldDef {
        FieldDef {
            name: name.to_owned(),
            value: Value::default(),
            padding: 0,
            deprecated: false,
            doc: String::new(),
            attributes: SymbolTable::new(),
        }
    }
}

/// A table or fixed struct definition.
#[derive(Debug, Serialize)]
pub struct StructDef {
    pub name: String,
    pub fields: SymbolTable<FieldDef>,
    /// Fixed structs are densely packed and stored inline; tables are
    /// vtable-addressed and offset-valued.
    pub fixed: bool,
    /// Still only known by name from a forward reference.
    pub predecl: bool,
    /// Whether scalar emission is reordered by descending size.
    pub sortbysize: bool,
    pub minalign: usize,
    pub bytesize: usize,
    pub doc: String,
    pub attributes: SymbolTable<Value>,
}

impl StructDef {
    pub fn new(name: &str) -> StructDef {
        StructDef {
            name: name.to_owned(),
            fields: SymbolTable::new(),
            fixed: false,
            predecl: true,
            sortbysize: true,
            minalign: 1,
            bytesize: 0,
            doc: String::new(),
            attributes: SymbolTable::new(),
        }
    }

    /// Pad the struct up to `alignment`, recording the pad bytes on the
    /// previous field so emission can reproduce them.
    pub fn pad_last_field(&mut self, alignment: usize) {
        let padding = padding_bytes(self.bytesize, alignment);
        self.bytesize += padding;
        if let Some(last) = self.fields.last_mut() {
            last.padding = padding;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumVal {
    pub name: String,
    pub value: i64,
    pub doc: String,
    /// The member table, populated only for union values.
    pub struct_def: Option<StructId>,
}

#[derive(Debug, Serialize)]
pub struct EnumDef {
    pub name: String,
    pub vals: SymbolTable<EnumVal>,
    pub is_union: bool,
    pub underlying_type: Type,
    pub doc: String,
    pub attributes: SymbolTable<Value>,
}

impl EnumDef {
    /// The value with the given ordinal, if any. Used to resolve union type
    /// tags back to their member tables.
    pub fn reverse_lookup(&self, value: i64) -> Option<&EnumVal> {
        self.vals.iter().map(|(_, v)| v).find(|v| v.value == value)
    }
}

/// An insertion-ordered symbol registry.
///
/// Entries are arena-allocated: the id handed out by `add` stays valid for
/// the life of the table, while a separate order list tracks declaration
/// order. Re-declaring a predeclared entry moves its id to the back of the
/// order without invalidating references held elsewhere.
#[derive(Debug, Clone)]
pub struct SymbolTable<T> {
    entries: Vec<(String, T)>,
    by_name: HashMap<String, usize>,
    order: Vec<usize>,
}

impl<T> SymbolTable<T> {
    pub fn new() -> SymbolTable<T> {
        SymbolTable {
            entries: Vec::new(),
            by_name: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Insert an entry. Returns true iff the name is already taken, in which
    /// case nothing is inserted and the caller reports the error.
    pub fn add(&mut self, name: &str, entry: T) -> bool {
        if self.by_name.contains_key(name) {
            return true;
        }
        let id = self.entries.len();
        self.entries.push((name.to_owned(), entry));
        self.by_name.insert(name.to_owned(), id);
        self.order.push(id);
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.id_of(name).map(|id| &self.entries[id].1)
    }

    pub fn get(&self, id: usize) -> &T {
        &self.entries[id].1
    }

    pub fn get_mut(&mut self, id: usize) -> &mut T {
        &mut self.entries[id].1
    }

    pub fn name_of(&self, id: usize) -> &str {
        &self.entries[id].0
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.order
            .iter()
            .map(move |&id| (self.entries[id].0.as_str(), &self.entries[id].1))
    }

    /// Ids in declaration order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Move `id` to the back of the declaration order.
    pub fn move_to_back(&mut self, id: usize) {
        self.order.retain(|&other| other != id);
        self.order.push(id);
    }

    /// Replace the declaration order; `order` must be a permutation of the
    /// ids.
    pub fn set_order(&mut self, order: Vec<usize>) {
        debug_assert_eq!(order.len(), self.entries.len());
        self.order = order;
    }

    /// The entry currently last in declaration order.
    pub fn last_mut(&mut self) -> Option<&mut T> {
        match self.order.last().copied() {
            Some(id) => Some(&mut self.entries[id].1),
            None => None,
        }
    }
}

impl<T> Default for SymbolTable<T> {
    fn default() -> SymbolTable<T> {
        SymbolTable::new()
    }
}

impl<T: Serialize> Serialize for SymbolTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, entry) in self.iter() {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

/// Bytes a value of `ty` occupies in its parent when stored inline.
pub fn inline_size(ty: &Type, structs: &SymbolTable<StructDef>) -> usize {
    if is_struct(ty, structs) {
        match ty.struct_def {
            Some(id) => structs.get(id.0).bytesize,
            None => ty.base.size(),
        }
    } else {
        ty.base.size()
    }
}

/// Alignment `ty` requires of its parent when stored inline.
pub fn inline_alignment(ty: &Type, structs: &SymbolTable<StructDef>) -> usize {
    if is_struct(ty, structs) {
        match ty.struct_def {
            Some(id) => structs.get(id.0).minalign,
            None => ty.base.size(),
        }
    } else {
        ty.base.size()
    }
}

/// True for fixed structs, which are stored inline; table references are
/// offset-valued and excluded.
pub fn is_struct(ty: &Type, structs: &SymbolTable<StructDef>) -> bool {
    match (ty.base, ty.struct_def) {
        (BaseType::Struct, Some(id)) => structs.get(id.0).fixed,
        _ => false,
    }
}
