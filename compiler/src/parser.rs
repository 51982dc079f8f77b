use tablewire_schema::{field_index_to_offset, Builder, UOffset, VOffset};

use crate::error::WireError;
use crate::lexer::Token;
use crate::types::{
    inline_alignment, inline_size, is_struct, BaseType, EnumDef, EnumId, EnumVal, FieldDef,
    StructDef, StructId, SymbolTable, Type, Value,
};
use crate::verifier;

/// Scalar emission passes for size-sorted tables, widest first.
const SORT_SIZES: [usize; 4] = [8, 4, 2, 1];

/// Parses schema text and encodes embedded JSON objects against it.
///
/// One parser instance accumulates definitions across `parse` calls, so a
/// schema and its payloads may arrive in separate sources. The encoded buffer
/// belongs to the most recent call and is read back with [buffer](Parser::buffer).
pub struct Parser {
    pub(crate) source: Vec<u8>,
    pub(crate) cursor: usize,
    pub(crate) line: usize,
    pub(crate) token: Token,
    pub(crate) attribute: String,
    pub(crate) doc_comment: String,
    structs: SymbolTable<StructDef>,
    enums: SymbolTable<EnumDef>,
    name_space: Vec<String>,
    root_struct_def: Option<StructId>,
    builder: Builder,
    /// Finished fixed-struct bytes waiting to be inlined into their parent.
    struct_stack: Vec<u8>,
    /// Parsed values of the tables currently open, innermost last. Each
    /// entry carries the field it belongs to; vector elements carry none.
    field_stack: Vec<(Value, Option<(StructId, usize)>)>,
}

impl Parser {
    pub fn new() -> Parser {
        Parser {
            source: Vec::new(),
            cursor: 0,
            line: 1,
            token: Token::Eof,
            attribute: String::new(),
            doc_comment: String::new(),
            structs: SymbolTable::new(),
            enums: SymbolTable::new(),
            name_space: Vec::new(),
            root_struct_def: None,
            builder: Builder::new(),
            struct_stack: Vec::new(),
            field_stack: Vec::new(),
        }
    }

    /// Parse a schema text, optionally followed by one JSON object for the
    /// current root type.
    pub fn parse(&mut self, source: &str) -> Result<(), WireError> {
        self.start_lexing(source);
        self.builder.clear();
        self.next()?;
        while self.token != Token::Eof {
            match self.token {
                Token::Namespace => self.parse_namespace()?,
                Token::Char('{') => {
                    let root = match self.root_struct_def {
                        Some(root) => root,
                        None => return Err(self.error("no root type set to parse json with")),
                    };
                    if self.builder.size() != 0 {
                        return Err(self.error("cannot have more than one json object in a file"));
                    }
                    let off = self.parse_table(root)?;
                    self.builder.finish(off);
                }
                Token::Enum => self.parse_enum(false)?,
                Token::Union => self.parse_enum(true)?,
                Token::RootType => {
                    self.next()?;
                    let root_type = self.attribute.clone();
                    self.expect(Token::Identifier)?;
                    self.expect(Token::Char(';'))?;
                    if !self.set_root_type(&root_type) {
                        return Err(self.error(format!("unknown root type: {}", root_type)));
                    }
                    if let Some(root) = self.root_struct_def {
                        if self.structs.get(root.0).fixed {
                            return Err(self.error("root type must be a table"));
                        }
                    }
                }
                _ => self.parse_decl()?,
            }
        }
        verifier::check_schema(self)?;
        debug_assert!(self.struct_stack.is_empty());
        Ok(())
    }

    /// Choose the root table for subsequent JSON objects. Returns false if
    /// no such type has been declared.
    pub fn set_root_type(&mut self, name: &str) -> bool {
        match self.structs.id_of(name) {
            Some(id) => {
                self.root_struct_def = Some(StructId(id));
                true
            }
            None => false,
        }
    }

    /// The buffer encoded by the latest parse; empty if the source carried
    /// no JSON object.
    pub fn buffer(&self) -> &[u8] {
        self.builder.data()
    }

    pub fn structs(&self) -> &SymbolTable<StructDef> {
        &self.structs
    }

    pub fn enums(&self) -> &SymbolTable<EnumDef> {
        &self.enums
    }

    pub fn namespace(&self) -> &[String] {
        &self.name_space
    }

    pub fn root_struct_def(&self) -> Option<&StructDef> {
        self.root_struct_def.map(|id| self.structs.get(id.0))
    }

    pub(crate) fn start_lexing(&mut self, source: &str) {
        self.source = source.as_bytes().to_vec();
        self.cursor = 0;
        self.line = 1;
    }

    pub(crate) fn error(&self, msg: impl Into<String>) -> WireError {
        WireError::Parse {
            msg: msg.into(),
            line: self.line,
        }
    }

    fn parse_namespace(&mut self) -> Result<(), WireError> {
        self.next()?;
        self.name_space.clear();
        loop {
            self.name_space.push(self.attribute.clone());
            self.expect(Token::Identifier)?;
            if !self.is_next(Token::Char('.'))? {
                break;
            }
        }
        self.expect(Token::Char(';'))
    }

    /// Resolve `name` to a struct id, creating a predeclared placeholder for
    /// forward references; circular references are legal and the driver
    /// checks that no placeholder survives the parse.
    fn lookup_create_struct(&mut self, name: &str) -> StructId {
        if let Some(id) = self.structs.id_of(name) {
            return StructId(id);
        }
        let id = self.structs.len();
        self.structs.add(name, StructDef::new(name));
        StructId(id)
    }

    fn parse_type(&mut self) -> Result<Type, WireError> {
        let ty = match self.token {
            Token::BaseType(base) => Type::new(base),
            Token::Identifier => {
                let name = self.attribute.clone();
                if let Some(id) = self.enums.id_of(&name) {
                    let def = self.enums.get(id);
                    let mut ty = def.underlying_type;
                    if def.is_union {
                        ty.base = BaseType::Union;
                    }
                    ty
                } else {
                    let mut ty = Type::new(BaseType::Struct);
                    ty.struct_def = Some(self.lookup_create_struct(&name));
                    ty
                }
            }
            Token::Char('[') => {
                self.next()?;
                let element = self.parse_type()?;
                if element.base == BaseType::Vector {
                    return Err(
                        self.error("nested vector types not supported (wrap in table first).")
                    );
                }
                if element.base == BaseType::Union {
                    return Err(
                        self.error("vector of union types not supported (wrap in table first).")
                    );
                }
                let mut ty = Type::new(BaseType::Vector);
                ty.element = element.base;
                ty.struct_def = element.struct_def;
                ty.enum_def = element.enum_def;
                self.expect(Token::Char(']'))?;
                return Ok(ty);
            }
            _ => return Err(self.error("illegal type syntax")),
        };
        self.next()?;
        Ok(ty)
    }

    /// Append a field to `struct_id`, assigning its vtable slot (tables) or
    /// computing its packed offset (fixed structs). Returns the field's id.
    fn add_field(&mut self, struct_id: StructId, name: &str, ty: Type) -> Result<usize, WireError> {
        let size = inline_size(&ty, &self.structs);
        let alignment = inline_alignment(&ty, &self.structs);
        let mut field = FieldDef::new(name);
        field.value.ty = ty;
        let def = self.structs.get_mut(struct_id.0);
        field.value.offset = field_index_to_offset(def.fields.len() as VOffset);
        if def.fixed {
            // align to the largest scalar so the packed layout is predictable
            def.minalign = def.minalign.max(alignment);
            def.pad_last_field(alignment);
            field.value.offset = def.bytesize as VOffset;
            def.bytesize += size;
        }
        let id = def.fields.len();
        if def.fields.add(name, field) {
            return Err(self.error(format!("field already exists: {}", name)));
        }
        Ok(id)
    }

    fn parse_field(&mut self, struct_id: StructId) -> Result<(), WireError> {
        let name = self.attribute.clone();
        let doc = self.doc_comment.clone();
        self.expect(Token::Identifier)?;
        self.expect(Token::Char(':'))?;
        let ty = self.parse_type()?;

        if self.structs.get(struct_id.0).fixed
            && !ty.base.is_scalar()
            && !is_struct(&ty, &self.structs)
        {
            return Err(self.error("structs may contain only scalar or struct fields"));
        }

        // union fields get a companion tag field, inserted first so the type
        // precedes the payload on the wire
        let mut typefield = None;
        if ty.base == BaseType::Union {
            if let Some(enum_id) = ty.enum_def {
                let underlying = self.enums.get(enum_id.0).underlying_type;
                let tag_name = format!("{}_type", name);
                typefield = Some(self.add_field(struct_id, &tag_name, underlying)?);
            }
        }

        let field_id = self.add_field(struct_id, &name, ty)?;

        if self.token == Token::Char('=') {
            self.next()?;
            let mut val = self.structs.get(struct_id.0).fields.get(field_id).value.clone();
            self.parse_single_value(&mut val)?;
            self.structs.get_mut(struct_id.0).fields.get_mut(field_id).value = val;
        }

        let attributes = self.parse_metadata()?;
        let deprecated = attributes.lookup("deprecated").is_some();
        let nested = attributes.lookup("nested_flatbuffer").cloned();
        let id_attr = attributes.lookup("id").cloned();
        {
            let field = self.structs.get_mut(struct_id.0).fields.get_mut(field_id);
            field.doc = doc;
            field.attributes = attributes;
            field.deprecated = deprecated;
        }
        if deprecated && self.structs.get(struct_id.0).fixed {
            return Err(self.error("can't deprecate fields in a struct"));
        }
        if let Some(nested) = nested {
            if nested.ty.base != BaseType::String {
                return Err(self.error("nested_flatbuffer attribute must be a string (the root type)"));
            }
            let field_ty = self.structs.get(struct_id.0).fields.get(field_id).value.ty;
            if field_ty.base != BaseType::Vector || field_ty.element != BaseType::UByte {
                return Err(
                    self.error("nested_flatbuffer attribute may only apply to a vector of ubyte")
                );
            }
            // errors at end of parse if the inner root type is never defined
            self.lookup_create_struct(&nested.constant);
        }
        if let (Some(typefield), Some(id_attr)) = (typefield, id_attr) {
            // a manually assigned id on a union field places the tag
            // immediately before the payload
            let id = parse_int(&id_attr.constant).unwrap_or(0);
            let tag_id = Value {
                ty: id_attr.ty,
                constant: (id - 1).to_string(),
                ..Value::default()
            };
            self.structs
                .get_mut(struct_id.0)
                .fields
                .get_mut(typefield)
                .attributes
                .add("id", tag_id);
        }
        self.expect(Token::Char(';'))?;
        Ok(())
    }

    /// `( name [: value] , ... )`, stored as an ordered attribute map.
    fn parse_metadata(&mut self) -> Result<SymbolTable<Value>, WireError> {
        let mut attributes = SymbolTable::new();
        if self.is_next(Token::Char('('))? {
            loop {
                let name = self.attribute.clone();
                self.expect(Token::Identifier)?;
                let mut value = Value::default();
                if self.is_next(Token::Char(':'))? {
                    self.parse_single_value(&mut value)?;
                }
                attributes.add(&name, value);
                if self.is_next(Token::Char(')'))? {
                    break;
                }
                self.expect(Token::Char(','))?;
            }
        }
        Ok(attributes)
    }

    fn parse_decl(&mut self) -> Result<(), WireError> {
        let doc = self.doc_comment.clone();
        let fixed = self.is_next(Token::Struct)?;
        if !fixed {
            self.expect(Token::Table)?;
        }
        let name = self.attribute.clone();
        self.expect(Token::Identifier)?;
        let struct_id = self.lookup_create_struct(&name);
        if !self.structs.get(struct_id.0).predecl {
            return Err(self.error(format!("datatype already exists: {}", name)));
        }
        {
            let def = self.structs.get_mut(struct_id.0);
            def.predecl = false;
            def.fixed = fixed;
            def.doc = doc;
        }
        // a predeclared entry now gets its real declaration position
        self.structs.move_to_back(struct_id.0);
        let attributes = self.parse_metadata()?;
        let sortbysize = attributes.lookup("original_order").is_none() && !fixed;
        let force_align = attributes.lookup("force_align").cloned();
        {
            let def = self.structs.get_mut(struct_id.0);
            def.attributes = attributes;
            def.sortbysize = sortbysize;
        }
        self.expect(Token::Char('{'))?;
        while self.token != Token::Char('}') {
            self.parse_field(struct_id)?;
        }
        if fixed {
            if let Some(force_align) = force_align {
                let align = parse_int(&force_align.constant).unwrap_or(0);
                let minalign = self.structs.get(struct_id.0).minalign as i64;
                if force_align.ty.base != BaseType::Int
                    || align < minalign
                    || align > 256
                    || (align & (align - 1)) != 0
                {
                    return Err(self.error(
                        "force_align must be a power of two integer ranging from the struct's \
                         natural alignment to 256",
                    ));
                }
                self.structs.get_mut(struct_id.0).minalign = align as usize;
            }
        }
        {
            let def = self.structs.get_mut(struct_id.0);
            let minalign = def.minalign;
            def.pad_last_field(minalign);
        }
        if !fixed && !self.structs.get(struct_id.0).fields.is_empty() {
            self.assign_manual_ids(struct_id)?;
        }
        self.expect(Token::Char('}'))?;
        Ok(())
    }

    /// If any field of the table carries an `id` attribute, all must; the
    /// ids must cover `0..n` and dictate vtable slots and field order.
    fn assign_manual_ids(&mut self, struct_id: StructId) -> Result<(), WireError> {
        let (mut ids, total) = {
            let def = self.structs.get(struct_id.0);
            let mut ids = Vec::new();
            for &field_id in def.fields.order() {
                if let Some(attr) = def.fields.get(field_id).attributes.lookup("id") {
                    ids.push((field_id, parse_int(&attr.constant).unwrap_or(0)));
                }
            }
            (ids, def.fields.len())
        };
        if ids.is_empty() {
            return Ok(());
        }
        if ids.len() != total {
            return Err(self.error("either all fields or no fields must have an 'id' attribute"));
        }
        ids.sort_by_key(|&(_, id)| id);
        for (index, &(field_id, id)) in ids.iter().enumerate() {
            if id != index as i64 {
                return Err(self.error(format!(
                    "field id's must be consecutive from 0, id {} missing or set twice",
                    index
                )));
            }
            self.structs
                .get_mut(struct_id.0)
                .fields
                .get_mut(field_id)
                .value
                .offset = field_index_to_offset(index as VOffset);
        }
        self.structs
            .get_mut(struct_id.0)
            .fields
            .set_order(ids.into_iter().map(|(field_id, _)| field_id).collect());
        Ok(())
    }

    fn parse_enum(&mut self, is_union: bool) -> Result<(), WireError> {
        let doc = self.doc_comment.clone();
        self.next()?;
        let name = self.attribute.clone();
        self.expect(Token::Identifier)?;
        let enum_id = EnumId(self.enums.len());
        let mut underlying = Type::new(BaseType::None);
        if is_union {
            // unions are tagged with an unsigned byte
            underlying.base = BaseType::UType;
            underlying.enum_def = Some(enum_id);
        }
        let def = EnumDef {
            name: name.clone(),
            vals: SymbolTable::new(),
            is_union,
            underlying_type: underlying,
            doc,
            attributes: SymbolTable::new(),
        };
        if self.enums.add(&name, def) {
            return Err(self.error(format!("enum already exists: {}", name)));
        }
        if !is_union {
            // the underlying type used to be optional, so it gets its own
            // diagnostic
            if !self.is_next(Token::Char(':'))? {
                return Err(self.error(
                    "must specify the underlying integer type for this enum \
                     (e.g. ': short', which was the default).",
                ));
            }
            let mut ty = self.parse_type()?;
            if !ty.base.is_integer() {
                return Err(self.error("underlying enum type must be integral"));
            }
            ty.enum_def = Some(enum_id);
            self.enums.get_mut(enum_id.0).underlying_type = ty;
        }
        let attributes = self.parse_metadata()?;
        self.enums.get_mut(enum_id.0).attributes = attributes;
        self.expect(Token::Char('{'))?;
        if is_union {
            self.enums.get_mut(enum_id.0).vals.add(
                "NONE",
                EnumVal {
                    name: "NONE".to_owned(),
                    value: 0,
                    doc: String::new(),
                    struct_def: None,
                },
            );
        }
        loop {
            let val_name = self.attribute.clone();
            let val_doc = self.doc_comment.clone();
            self.expect(Token::Identifier)?;
            let (prev_count, next_value) = {
                let vals = &self.enums.get(enum_id.0).vals;
                let next = match vals.order().last() {
                    Some(&last) => vals.get(last).value + 1,
                    None => 0,
                };
                (vals.len(), next)
            };
            let struct_def = if is_union {
                Some(self.lookup_create_struct(&val_name))
            } else {
                None
            };
            let val = EnumVal {
                name: val_name.clone(),
                value: next_value,
                doc: val_doc,
                struct_def,
            };
            if self.enums.get_mut(enum_id.0).vals.add(&val_name, val) {
                return Err(self.error(format!("enum value already exists: {}", val_name)));
            }
            if self.is_next(Token::Char('='))? {
                let text = self.attribute.clone();
                self.expect(Token::IntegerConstant)?;
                let value = parse_int(&text).unwrap_or(0);
                let ascending = {
                    let vals = &self.enums.get(enum_id.0).vals;
                    prev_count == 0 || vals.get(vals.order()[prev_count - 1]).value < value
                };
                if !ascending {
                    return Err(self.error("enum values must be specified in ascending order"));
                }
                if let Some(last) = self.enums.get_mut(enum_id.0).vals.last_mut() {
                    last.value = value;
                }
            }
            if !self.is_next(Token::Char(','))? {
                break;
            }
        }
        self.expect(Token::Char('}'))?;
        if self.enums.get(enum_id.0).attributes.lookup("bit_flags").is_some() {
            let bits = self.enums.get(enum_id.0).underlying_type.base.size() * 8;
            let val_ids: Vec<usize> = self.enums.get(enum_id.0).vals.order().to_vec();
            for val_id in val_ids {
                let ordinal = self.enums.get(enum_id.0).vals.get(val_id).value;
                if ordinal < 0 || ordinal as usize >= bits {
                    return Err(self.error("bit flag out of range of underlying integral type"));
                }
                self.enums.get_mut(enum_id.0).vals.get_mut(val_id).value = 1i64 << ordinal;
            }
        }
        Ok(())
    }

    /// Parse a `{ name: value, ... }` object against `struct_id` and build
    /// it. For tables, returns the finished table's offset; for fixed
    /// structs, the finished bytes are staged on `struct_stack` and the
    /// return value is their starting index there.
    fn parse_table(&mut self, struct_id: StructId) -> Result<UOffset, WireError> {
        self.expect(Token::Char('{'))?;
        let (fixed, sortbysize, minalign, bytesize, field_count, struct_name) = {
            let def = self.structs.get(struct_id.0);
            (
                def.fixed,
                def.sortbysize,
                def.minalign,
                def.bytesize,
                def.fields.len(),
                def.name.clone(),
            )
        };
        let mut parsed = 0usize;
        if self.token == Token::Char('}') {
            self.next()?;
        } else {
            loop {
                let name = self.attribute.clone();
                if !self.is_next(Token::StringConstant)? {
                    self.expect(Token::Identifier)?;
                }
                let field_id = match self.structs.get(struct_id.0).fields.id_of(&name) {
                    Some(id) => id,
                    None => return Err(self.error(format!("unknown field: {}", name))),
                };
                if fixed {
                    let order = self.structs.get(struct_id.0).fields.order();
                    if parsed >= order.len() || order[parsed] != field_id {
                        return Err(
                            self.error(format!("struct field appearing out of order: {}", name))
                        );
                    }
                }
                self.expect(Token::Char(':'))?;
                let mut val = self.structs.get(struct_id.0).fields.get(field_id).value.clone();
                self.parse_any_value(&mut val, Some((struct_id, field_id)))?;
                self.field_stack.push((val, Some((struct_id, field_id))));
                parsed += 1;
                if self.is_next(Token::Char('}'))? {
                    break;
                }
                self.expect(Token::Char(','))?;
            }
        }
        if fixed && parsed != field_count {
            return Err(self.error(format!("incomplete struct initialization: {}", struct_name)));
        }

        let start = if fixed {
            self.builder.start_struct(minalign)
        } else {
            self.builder.start_table()
        };

        // two-pass construction over the parsed values, in reverse since the
        // buffer is built backwards; size-sorted tables emit wide scalars
        // first so no alignment gaps appear between fields
        let passes: &[usize] = if sortbysize { &SORT_SIZES } else { &[0] };
        let base = self.field_stack.len() - parsed;
        for &size in passes {
            for index in (base..self.field_stack.len()).rev() {
                let (value, member) = self.field_stack[index].clone();
                if sortbysize && size != value.ty.base.size() {
                    continue;
                }
                if let Some((owner, field_id)) = member {
                    self.emit_member(&value, owner, field_id)?;
                }
            }
        }
        self.field_stack.truncate(base);

        if fixed {
            self.builder.clear_offsets();
            self.builder.end_struct();
            // stage the finished bytes in the side buffer and rewind; the
            // parent re-emits them inline when it is built itself
            let off = self.struct_stack.len();
            self.struct_stack
                .extend_from_slice(&self.builder.data()[..bytesize]);
            self.builder.pop_bytes(bytesize);
            Ok(off as UOffset)
        } else {
            Ok(self.builder.end_table(start, field_count as VOffset))
        }
    }

    /// Emit one parsed member of a table or fixed struct.
    fn emit_member(
        &mut self,
        value: &Value,
        owner: StructId,
        field_id: usize,
    ) -> Result<(), WireError> {
        let (padding, declared, fixed) = {
            let def = self.structs.get(owner.0);
            let field = def.fields.get(field_id);
            (field.padding, field.value.clone(), def.fixed)
        };
        self.builder.pad(padding);
        if value.ty.base.is_scalar() {
            if fixed {
                // every field of a fixed struct is present on the wire
                self.push_scalar(value.ty.base, &value.constant)?;
            } else {
                self.add_scalar(value.offset, value.ty.base, &value.constant, &declared.constant)?;
            }
        } else {
            match (declared.ty.base, declared.ty.struct_def) {
                (BaseType::Struct, Some(id)) if self.structs.get(id.0).fixed => {
                    self.serialize_struct(id, value)?;
                }
                _ => {
                    let off = self.int_constant(&value.constant, 32)? as UOffset;
                    self.builder.add_offset(value.offset, off);
                }
            }
        }
        Ok(())
    }

    /// Pull a staged fixed struct out of the side buffer and emit it inline
    /// at the current position, recording that position for the field.
    fn serialize_struct(&mut self, struct_id: StructId, val: &Value) -> Result<(), WireError> {
        let off = self.int_constant(&val.constant, 32)? as usize;
        let (minalign, bytesize) = {
            let def = self.structs.get(struct_id.0);
            (def.minalign, def.bytesize)
        };
        debug_assert_eq!(self.struct_stack.len() - off, bytesize);
        self.builder.align(minalign);
        let bytes = self.struct_stack.split_off(off);
        self.builder.push_bytes(&bytes);
        let here = self.builder.size();
        self.builder.add_struct_offset(val.offset, here);
        Ok(())
    }

    /// `[ value, ... ]` after the opening bracket has been consumed.
    fn parse_vector(&mut self, ty: &Type) -> Result<UOffset, WireError> {
        let mut count = 0usize;
        if self.token != Token::Char(']') {
            loop {
                let mut val = Value {
                    ty: *ty,
                    ..Value::default()
                };
                self.parse_any_value(&mut val, None)?;
                self.field_stack.push((val, None));
                count += 1;
                if self.token == Token::Char(']') {
                    break;
                }
                self.expect(Token::Char(','))?;
            }
        }
        self.next()?;

        let bytes = count * inline_size(ty, &self.structs);
        let align = inline_alignment(ty, &self.structs);
        self.builder.start_vector(bytes, align);
        for _ in 0..count {
            // start at the back, since the data is built backwards
            let (val, _) = match self.field_stack.pop() {
                Some(entry) => entry,
                None => break,
            };
            match (val.ty.base, val.ty.struct_def) {
                (BaseType::Struct, Some(id)) if self.structs.get(id.0).fixed => {
                    self.serialize_struct(id, &val)?;
                }
                (base, _) if base.is_scalar() => {
                    self.push_scalar(base, &val.constant)?;
                }
                _ => {
                    // offset elements: strings and tables
                    let off = self.int_constant(&val.constant, 32)? as UOffset;
                    let rel = self.builder.refer_to(off);
                    self.builder.push_element::<UOffset>(rel);
                }
            }
        }
        self.builder.clear_offsets();
        Ok(self.builder.end_vector(count))
    }

    /// Parse a value of any shape the expected type allows.
    fn parse_any_value(
        &mut self,
        val: &mut Value,
        field: Option<(StructId, usize)>,
    ) -> Result<(), WireError> {
        match val.ty.base {
            BaseType::Union => {
                let field_name = match field {
                    Some((owner, id)) => self.structs.get(owner.0).fields.name_of(id).to_owned(),
                    None => String::new(),
                };
                // the companion tag must already be on the stack; it selects
                // the union member to parse
                let tag_constant = match self.field_stack.last() {
                    Some((tag, Some((owner, id))))
                        if self.structs.get(owner.0).fields.get(*id).value.ty.base
                            == BaseType::UType =>
                    {
                        tag.constant.clone()
                    }
                    _ => {
                        return Err(self.error(format!(
                            "missing type field before this union value: {}",
                            field_name
                        )))
                    }
                };
                let tag = self.int_constant(&tag_constant, 8)?;
                let member = val
                    .ty
                    .enum_def
                    .and_then(|id| self.enums.get(id.0).reverse_lookup(tag))
                    .and_then(|member| member.struct_def);
                let member = match member {
                    Some(member) => member,
                    None => {
                        return Err(self.error(format!("illegal type id for: {}", field_name)))
                    }
                };
                val.constant = self.parse_table(member)?.to_string();
            }
            BaseType::Struct => {
                let struct_id = match val.ty.struct_def {
                    Some(id) => id,
                    None => return Err(self.error("illegal type syntax")),
                };
                val.constant = self.parse_table(struct_id)?.to_string();
            }
            BaseType::String => {
                let text = self.attribute.clone();
                self.expect(Token::StringConstant)?;
                val.constant = self.builder.create_string(&text).to_string();
            }
            BaseType::Vector => {
                self.expect(Token::Char('['))?;
                let element = val.ty.vector_type();
                val.constant = self.parse_vector(&element)?.to_string();
            }
            _ => self.parse_single_value(val)?,
        }
        Ok(())
    }

    /// Parse a scalar or string literal into `e`, adopting the literal's
    /// type if `e` is untyped and rejecting it on a mismatch.
    fn try_typed_value(
        &mut self,
        dtoken: Token,
        check: bool,
        e: &mut Value,
        req: BaseType,
    ) -> Result<bool, WireError> {
        let matched = dtoken == self.token;
        if matched {
            e.constant = self.attribute.clone();
            if !check {
                if e.ty.base == BaseType::None {
                    e.ty.base = req;
                } else {
                    return Err(self.error(format!(
                        "type mismatch: expecting: {}, found: {}",
                        e.ty.base.name(),
                        req.name()
                    )));
                }
            }
            self.next()?;
        }
        Ok(matched)
    }

    fn parse_single_value(&mut self, e: &mut Value) -> Result<(), WireError> {
        // identifiers and strings against a typed slot are enum expressions
        if e.ty.base != BaseType::String
            && e.ty.base != BaseType::None
            && (self.token == Token::Identifier || self.token == Token::StringConstant)
        {
            let value = self.parse_integer_from_string(&e.ty)?;
            e.constant = value.to_string();
            self.next()?;
        } else if self.try_typed_value(
            Token::IntegerConstant,
            e.ty.base.is_scalar(),
            e,
            BaseType::Int,
        )? {
            if e.ty.base.is_integer() {
                let constant = e.constant.clone();
                self.int_constant(&constant, e.ty.base.size() * 8)?;
            }
        } else if self.try_typed_value(Token::FloatConstant, e.ty.base.is_float(), e, BaseType::Float)?
            || self.try_typed_value(
                Token::StringConstant,
                e.ty.base == BaseType::String,
                e,
                BaseType::String,
            )?
        {
        } else {
            return Err(self.error(format!("cannot parse value starting with: {}", self.token)));
        }
        Ok(())
    }

    /// A whitespace-separated OR of enum names: bare names when the slot has
    /// an enum type, `Enum.Value` when it is a plain integer.
    fn parse_integer_from_string(&mut self, ty: &Type) -> Result<i64, WireError> {
        let mut result = 0i64;
        let attribute = self.attribute.clone();
        for word in attribute.split(' ').filter(|word| !word.is_empty()) {
            if let Some(enum_id) = ty.enum_def {
                match self.enums.get(enum_id.0).vals.lookup(word) {
                    Some(val) => result |= val.value,
                    None => {
                        return Err(self.error(format!(
                            "unknown enum value: {}, for enum: {}",
                            word,
                            self.enums.get(enum_id.0).name
                        )))
                    }
                }
            } else {
                if !ty.base.is_integer() {
                    return Err(self.error(format!("not a valid value for this field: {}", word)));
                }
                let dot = match word.find('.') {
                    Some(dot) => dot,
                    None => {
                        return Err(self.error("enum values need to be qualified by an enum type"))
                    }
                };
                let (enum_name, val_name) = (&word[..dot], &word[dot + 1..]);
                let def = match self.enums.lookup(enum_name) {
                    Some(def) => def,
                    None => return Err(self.error(format!("unknown enum: {}", enum_name))),
                };
                match def.vals.lookup(val_name) {
                    Some(val) => result |= val.value,
                    None => {
                        return Err(self.error(format!("unknown enum value: {}", val_name)))
                    }
                }
            }
        }
        Ok(result)
    }

    /// Parse an integer constant, checking it fits in `bits` with the
    /// two-sided mask test: the high bits must be all clear (positive or
    /// unsigned) or all set (negative, sign-extended).
    fn int_constant(&self, text: &str, bits: usize) -> Result<i64, WireError> {
        let value = match parse_int(text) {
            Some(value) => value,
            None => return Err(self.error(format!("invalid integer: {}", text))),
        };
        if bits < 64 {
            let mask = (1i64 << bits) - 1;
            if (value & !mask) != 0 && (value | mask) != -1 {
                return Err(self.error(format!("constant does not fit in a {}-bit field", bits)));
            }
        }
        Ok(value)
    }

    fn float_constant(&self, text: &str) -> Result<f64, WireError> {
        match text.parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) => Err(self.error(format!("invalid float: {}", text))),
        }
    }

    /// Emit one table scalar, suppressed when it equals the declared
    /// default.
    fn add_scalar(
        &mut self,
        slot: VOffset,
        base: BaseType,
        constant: &str,
        default: &str,
    ) -> Result<(), WireError> {
        use BaseType::*;
        match base {
            Bool => {
                let value = self.int_constant(constant, 64)? != 0;
                let declared = self.int_constant(default, 64)? != 0;
                self.builder.add_element::<bool>(slot, value, declared);
            }
            UType | UByte => {
                let value = self.int_constant(constant, 8)? as u8;
                let declared = self.int_constant(default, 8)? as u8;
                self.builder.add_element::<u8>(slot, value, declared);
            }
            Byte => {
                let value = self.int_constant(constant, 8)? as i8;
                let declared = self.int_constant(default, 8)? as i8;
                self.builder.add_element::<i8>(slot, value, declared);
            }
            Short => {
                let value = self.int_constant(constant, 16)? as i16;
                let declared = self.int_constant(default, 16)? as i16;
                self.builder.add_element::<i16>(slot, value, declared);
            }
            UShort => {
                let value = self.int_constant(constant, 16)? as u16;
                let declared = self.int_constant(default, 16)? as u16;
                self.builder.add_element::<u16>(slot, value, declared);
            }
            Int => {
                let value = self.int_constant(constant, 32)? as i32;
                let declared = self.int_constant(default, 32)? as i32;
                self.builder.add_element::<i32>(slot, value, declared);
            }
            UInt => {
                let value = self.int_constant(constant, 32)? as u32;
                let declared = self.int_constant(default, 32)? as u32;
                self.builder.add_element::<u32>(slot, value, declared);
            }
            Long => {
                let value = self.int_constant(constant, 64)?;
                let declared = self.int_constant(default, 64)?;
                self.builder.add_element::<i64>(slot, value, declared);
            }
            ULong => {
                let value = self.int_constant(constant, 64)? as u64;
                let declared = self.int_constant(default, 64)? as u64;
                self.builder.add_element::<u64>(slot, value, declared);
            }
            Float => {
                let value = self.float_constant(constant)? as f32;
                let declared = self.float_constant(default)? as f32;
                self.builder.add_element::<f32>(slot, value, declared);
            }
            Double => {
                let value = self.float_constant(constant)?;
                let declared = self.float_constant(default)?;
                self.builder.add_element::<f64>(slot, value, declared);
            }
            _ => unreachable!("non-scalar in scalar emission"),
        }
        Ok(())
    }

    /// Emit one scalar unconditionally: struct members and vector elements
    /// are always present.
    fn push_scalar(&mut self, base: BaseType, constant: &str) -> Result<(), WireError> {
        use BaseType::*;
        match base {
            Bool => {
                let value = self.int_constant(constant, 64)? != 0;
                self.builder.push_element::<bool>(value);
            }
            UType | UByte => {
                let value = self.int_constant(constant, 8)? as u8;
                self.builder.push_element::<u8>(value);
            }
            Byte => {
                let value = self.int_constant(constant, 8)? as i8;
                self.builder.push_element::<i8>(value);
            }
            Short => {
                let value = self.int_constant(constant, 16)? as i16;
                self.builder.push_element::<i16>(value);
            }
            UShort => {
                let value = self.int_constant(constant, 16)? as u16;
                self.builder.push_element::<u16>(value);
            }
            Int => {
                let value = self.int_constant(constant, 32)? as i32;
                self.builder.push_element::<i32>(value);
            }
            UInt => {
                let value = self.int_constant(constant, 32)? as u32;
                self.builder.push_element::<u32>(value);
            }
            Long => {
                let value = self.int_constant(constant, 64)?;
                self.builder.push_element::<i64>(value);
            }
            ULong => {
                let value = self.int_constant(constant, 64)? as u64;
                self.builder.push_element::<u64>(value);
            }
            Float => {
                let value = self.float_constant(constant)? as f32;
                self.builder.push_element::<f32>(value);
            }
            Double => {
                let value = self.float_constant(constant)?;
                self.builder.push_element::<f64>(value);
            }
            _ => unreachable!("non-scalar in scalar emission"),
        }
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new()
    }
}

/// Decimal integer parse accepting the full 64-bit range, signed or not.
fn parse_int(text: &str) -> Option<i64> {
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<u64>().ok().map(|value| value as i64))
}
