use tablewire::{field_index_to_offset, BaseType, Parser, Table};

fn parse_ok(source: &str) -> Parser {
    let mut parser = Parser::new();
    if let Err(err) = parser.parse(source) {
        panic!("parse failed: {}", err);
    }
    parser
}

fn parse_err(source: &str) -> String {
    let mut parser = Parser::new();
    match parser.parse(source) {
        Ok(()) => panic!("parse unexpectedly succeeded"),
        Err(err) => err.to_string(),
    }
}

#[test]
fn minimal_table_with_default_suppression() {
    let parser = parse_ok(r#"table T { x: int = 7; } root_type T; { "x": 7 }"#);
    assert!(!parser.buffer().is_empty());
    let root = Table::root(parser.buffer());
    // the value equals the declared default, so the vtable omits the slot
    assert!(!root.present(field_index_to_offset(0)));
    assert_eq!(root.scalar::<i32>(field_index_to_offset(0), 7), 7);
}

#[test]
fn non_default_scalar_is_emitted() {
    let parser = parse_ok(r#"table T { x: int = 7; } root_type T; { "x": 8 }"#);
    let root = Table::root(parser.buffer());
    assert!(root.present(field_index_to_offset(0)));
    assert_eq!(root.scalar::<i32>(field_index_to_offset(0), 7), 8);
}

#[test]
fn out_of_range_integer_is_rejected() {
    let err = parse_err(r#"table T { x: byte; } root_type T; { "x": 300 }"#);
    assert_eq!(err, "line 1: constant does not fit in a 8-bit field");
    // negative values sign-extend into the same width
    parse_ok(r#"table T { x: byte; } root_type T; { "x": -128 }"#);
    let err = parse_err(r#"table T { x: byte; } root_type T; { "x": -129 }"#);
    assert_eq!(err, "line 1: constant does not fit in a 8-bit field");
}

#[test]
fn forward_reference_is_resolved() {
    let parser = parse_ok(
        r#"
        table A { b: B; }
        table B { x: int; }
        root_type A;
        { "b": { "x": 1 } }
        "#,
    );
    let root = Table::root(parser.buffer());
    let b = root.table(field_index_to_offset(0)).expect("b missing");
    assert_eq!(b.scalar::<i32>(field_index_to_offset(0), 0), 1);
}

#[test]
fn unresolved_forward_reference_is_reported() {
    let err = parse_err("table A { b: B; } root_type A;");
    assert!(err.ends_with("type referenced but not defined: B"));
}

#[test]
fn union_with_type_tag() {
    let parser = parse_ok(
        r#"
        table X { a: int; }
        table Y { b: int; }
        union U { X, Y }
        table T { u: U; }
        root_type T;
        { "u_type": "X", "u": { "a": 1 } }
        "#,
    );
    let root = Table::root(parser.buffer());
    // the synthesized u_type field precedes the payload: slot 0 is the tag
    assert_eq!(root.scalar::<u8>(field_index_to_offset(0), 0), 1);
    let payload = root.table(field_index_to_offset(1)).expect("u missing");
    assert_eq!(payload.scalar::<i32>(field_index_to_offset(0), 0), 1);
}

#[test]
fn union_payload_without_tag_is_rejected() {
    let err = parse_err(
        r#"
        table X { a: int; }
        union U { X }
        table T { u: U; }
        root_type T;
        { "u": { "a": 1 } }
        "#,
    );
    assert!(err.ends_with("missing type field before this union value: u"));
}

#[test]
fn union_members_must_be_tables() {
    let err = parse_err(
        r#"
        struct X { a: int; }
        union U { X }
        table T { u: U; }
        root_type T;
        "#,
    );
    assert!(err.ends_with("only tables can be union elements: X"));
}

#[test]
fn struct_fields_must_appear_in_order() {
    let schema = "struct S { a: int; b: int; } table T { s: S; } root_type T;";
    let err = parse_err(&format!(r#"{} {{ "s": {{ "b": 1, "a": 2 }} }}"#, schema));
    assert!(err.ends_with("struct field appearing out of order: b"));

    let parser = parse_ok(&format!(r#"{} {{ "s": {{ "a": 2, "b": 1 }} }}"#, schema));
    let root = Table::root(parser.buffer());
    let pos = root.struct_pos(field_index_to_offset(0)).expect("s missing");
    // a fully in-lined 8-byte payload, declaration order preserved
    assert_eq!(&parser.buffer()[pos..pos + 8], [2, 0, 0, 0, 1, 0, 0, 0]);
}

#[test]
fn incomplete_struct_literal_is_rejected() {
    let err = parse_err(
        r#"struct S { a: int; b: int; } table T { s: S; } root_type T; { "s": { "a": 1 } }"#,
    );
    assert!(err.ends_with("incomplete struct initialization: S"));
}

#[test]
fn struct_layout_is_aligned_and_padded() {
    let parser = parse_ok("struct S { a: byte; b: int; c: short; } table T { s: S; } root_type T;");
    let def = parser.structs().lookup("S").expect("S missing");
    assert!(def.fixed);
    assert_eq!(def.minalign, 4);
    // a at 0 (pad 3), b at 4, c at 8 (pad 2), total 12
    assert_eq!(def.bytesize, 12);
    assert_eq!(def.bytesize % def.minalign, 0);
    assert_eq!(def.fields.lookup("a").map(|f| f.value.offset), Some(0));
    assert_eq!(def.fields.lookup("b").map(|f| f.value.offset), Some(4));
    assert_eq!(def.fields.lookup("c").map(|f| f.value.offset), Some(8));
}

#[test]
fn nested_structs_are_inlined() {
    let parser = parse_ok(
        r#"
        struct Inner { x: int; }
        struct Outer { i: Inner; y: int; }
        table T { o: Outer; }
        root_type T;
        { "o": { "i": { "x": 1 }, "y": 2 } }
        "#,
    );
    let root = Table::root(parser.buffer());
    let pos = root.struct_pos(field_index_to_offset(0)).expect("o missing");
    assert_eq!(&parser.buffer()[pos..pos + 8], [1, 0, 0, 0, 2, 0, 0, 0]);
}

#[test]
fn scalars_of_every_width_round_trip() {
    let parser = parse_ok(
        r#"
        table T {
          a: bool;
          b: byte;
          c: ushort;
          d: uint;
          e: long;
          f: float;
          g: double;
        }
        root_type T;
        { "a": true, "b": -5, "c": 65535, "d": 4000000000, "e": 123456789012, "f": 1.5, "g": 2.25e2 }
        "#,
    );
    let root = Table::root(parser.buffer());
    assert!(root.scalar::<bool>(field_index_to_offset(0), false));
    assert_eq!(root.scalar::<i8>(field_index_to_offset(1), 0), -5);
    assert_eq!(root.scalar::<u16>(field_index_to_offset(2), 0), 65535);
    assert_eq!(root.scalar::<u32>(field_index_to_offset(3), 0), 4000000000);
    assert_eq!(root.scalar::<i64>(field_index_to_offset(4), 0), 123456789012);
    assert_eq!(root.scalar::<f32>(field_index_to_offset(5), 0.0), 1.5);
    assert_eq!(root.scalar::<f64>(field_index_to_offset(6), 0.0), 225.0);
}

#[test]
fn size_sorted_and_declaration_order_emission_agree() {
    for attr in ["", "(original_order)"] {
        let parser = parse_ok(&format!(
            r#"table M {} {{ a: byte; b: long; c: short; }} root_type M; {{ "a": 1, "b": 2, "c": 3 }}"#,
            attr
        ));
        let root = Table::root(parser.buffer());
        // emission order is an encoding detail; the vtable contract is fixed
        assert_eq!(root.scalar::<i8>(field_index_to_offset(0), 0), 1);
        assert_eq!(root.scalar::<i64>(field_index_to_offset(1), 0), 2);
        assert_eq!(root.scalar::<i16>(field_index_to_offset(2), 0), 3);
    }
}

#[test]
fn strings_round_trip() {
    let parser = parse_ok(
        r#"table T { s: string; e: string; } root_type T; { "s": "hi \"there\"\n", "e": "" }"#,
    );
    let root = Table::root(parser.buffer());
    assert_eq!(root.string(field_index_to_offset(0)), Some("hi \"there\"\n"));
    assert_eq!(root.string(field_index_to_offset(1)), Some(""));
}

#[test]
fn vectors_of_scalars_round_trip() {
    let parser = parse_ok(r#"table T { xs: [short]; } root_type T; { "xs": [1, -2, 3] }"#);
    let root = Table::root(parser.buffer());
    let xs = root.vector(field_index_to_offset(0)).expect("xs missing");
    assert_eq!(xs.len(), 3);
    assert_eq!(xs.scalar::<i16>(0), 1);
    assert_eq!(xs.scalar::<i16>(1), -2);
    assert_eq!(xs.scalar::<i16>(2), 3);
}

#[test]
fn empty_vector_round_trips() {
    let parser = parse_ok(r#"table T { xs: [int]; } root_type T; { "xs": [] }"#);
    let root = Table::root(parser.buffer());
    let xs = root.vector(field_index_to_offset(0)).expect("xs missing");
    assert!(xs.is_empty());
}

#[test]
fn vectors_of_strings_round_trip() {
    let parser = parse_ok(r#"table T { ss: [string]; } root_type T; { "ss": ["a", "bc"] }"#);
    let root = Table::root(parser.buffer());
    let ss = root.vector(field_index_to_offset(0)).expect("ss missing");
    assert_eq!(ss.len(), 2);
    assert_eq!(ss.string(0), "a");
    assert_eq!(ss.string(1), "bc");
}

#[test]
fn vectors_of_structs_are_inlined() {
    let parser = parse_ok(
        r#"
        struct P { x: byte; y: byte; }
        table T { ps: [P]; }
        root_type T;
        { "ps": [ { "x": 1, "y": 2 }, { "x": 3, "y": 4 } ] }
        "#,
    );
    let root = Table::root(parser.buffer());
    let ps = root.vector(field_index_to_offset(0)).expect("ps missing");
    assert_eq!(ps.len(), 2);
    let first = ps.struct_pos(0, 2);
    let second = ps.struct_pos(1, 2);
    assert_eq!(&parser.buffer()[first..first + 2], [1, 2]);
    assert_eq!(&parser.buffer()[second..second + 2], [3, 4]);
}

#[test]
fn vectors_of_tables_round_trip() {
    let parser = parse_ok(
        r#"
        table E { v: int; }
        table T { es: [E]; }
        root_type T;
        { "es": [ { "v": 10 }, { "v": 20 } ] }
        "#,
    );
    let root = Table::root(parser.buffer());
    let es = root.vector(field_index_to_offset(0)).expect("es missing");
    assert_eq!(es.len(), 2);
    assert_eq!(es.table(0).scalar::<i32>(field_index_to_offset(0), 0), 10);
    assert_eq!(es.table(1).scalar::<i32>(field_index_to_offset(0), 0), 20);
}

#[test]
fn nested_vectors_and_vector_unions_are_rejected() {
    let err = parse_err("table T { v: [[int]]; }");
    assert!(err.contains("nested vector types not supported"));
    let err = parse_err("table X { a: int; } union U { X } table T { v: [U]; }");
    assert!(err.contains("vector of union types not supported"));
}

#[test]
fn enums_count_up_from_explicit_values() {
    let parser = parse_ok("enum Color : byte { Red, Green = 3, Blue }");
    let def = parser.enums().lookup("Color").expect("Color missing");
    assert_eq!(def.underlying_type.base, BaseType::Byte);
    let values: Vec<(String, i64)> = def
        .vals
        .iter()
        .map(|(name, val)| (name.to_owned(), val.value))
        .collect();
    assert_eq!(
        values,
        [
            ("Red".to_owned(), 0),
            ("Green".to_owned(), 3),
            ("Blue".to_owned(), 4),
        ]
    );
}

#[test]
fn enum_values_must_ascend() {
    let err = parse_err("enum E : int { A = 2, B = 1 }");
    assert!(err.ends_with("enum values must be specified in ascending order"));
}

#[test]
fn enum_needs_underlying_type() {
    let err = parse_err("enum E { A }");
    assert!(err.contains("must specify the underlying integer type"));
    let err = parse_err("enum E : string { A }");
    assert!(err.ends_with("underlying enum type must be integral"));
}

#[test]
fn bit_flags_rewrite_ordinals() {
    let parser = parse_ok("enum F : ubyte (bit_flags) { A, B, C }");
    let def = parser.enums().lookup("F").expect("F missing");
    let values: Vec<i64> = def.vals.iter().map(|(_, val)| val.value).collect();
    assert_eq!(values, [1, 2, 4]);

    let err = parse_err("enum F : ubyte (bit_flags) { A = 8 }");
    assert!(err.ends_with("bit flag out of range of underlying integral type"));
}

#[test]
fn enum_expressions_or_their_terms() {
    let parser = parse_ok(
        r#"
        enum F : ubyte (bit_flags) { A, B, C }
        table T { f: F; }
        root_type T;
        { "f": "A C" }
        "#,
    );
    let root = Table::root(parser.buffer());
    assert_eq!(root.scalar::<u8>(field_index_to_offset(0), 0), 5);
}

#[test]
fn enum_value_as_bare_identifier() {
    let parser = parse_ok(
        r#"
        enum Color : byte { Red, Green = 3 }
        table T { c: Color; }
        root_type T;
        { "c": Green }
        "#,
    );
    let root = Table::root(parser.buffer());
    assert_eq!(root.scalar::<i8>(field_index_to_offset(0), 0), 3);
}

#[test]
fn integer_fields_take_qualified_enum_values() {
    let parser = parse_ok(
        r#"
        enum Color : byte { Red, Green = 3 }
        table T { x: int; }
        root_type T;
        { "x": "Color.Green" }
        "#,
    );
    let root = Table::root(parser.buffer());
    assert_eq!(root.scalar::<i32>(field_index_to_offset(0), 0), 3);

    let err = parse_err(
        r#"
        table T { x: int; }
        root_type T;
        { "x": "Green" }
        "#,
    );
    assert!(err.ends_with("enum values need to be qualified by an enum type"));
}

#[test]
fn unknown_enum_terms_are_reported() {
    let err = parse_err(
        r#"
        enum Color : byte { Red }
        table T { c: Color; }
        root_type T;
        { "c": "Pink" }
        "#,
    );
    assert!(err.ends_with("unknown enum value: Pink, for enum: Color"));
}

#[test]
fn enum_typed_default_suppresses_matching_value() {
    let parser = parse_ok(
        r#"
        enum Color : byte { Red, Green = 3 }
        table T { c: Color = Green; }
        root_type T;
        { "c": "Green" }
        "#,
    );
    let root = Table::root(parser.buffer());
    assert!(!root.present(field_index_to_offset(0)));
}

#[test]
fn manual_ids_reorder_vtable_slots() {
    let parser = parse_ok(
        r#"
        table T { a: int (id: 1); b: short (id: 0); }
        root_type T;
        { "a": 5, "b": 6 }
        "#,
    );
    let root = Table::root(parser.buffer());
    assert_eq!(root.scalar::<i16>(field_index_to_offset(0), 0), 6);
    assert_eq!(root.scalar::<i32>(field_index_to_offset(1), 0), 5);
}

#[test]
fn manual_ids_must_cover_all_fields_contiguously() {
    let err = parse_err("table T { a: int (id: 0); b: int; }");
    assert!(err.ends_with("either all fields or no fields must have an 'id' attribute"));
    let err = parse_err("table T { a: int (id: 0); b: int (id: 2); }");
    assert!(err.ends_with("field id's must be consecutive from 0, id 1 missing or set twice"));
}

#[test]
fn union_with_manual_ids_places_tag_before_payload() {
    let parser = parse_ok(
        r#"
        table X { a: int; }
        table Y { a: int; }
        union U { X, Y }
        table T { f: int (id: 2); u: U (id: 1); }
        root_type T;
        { "u_type": "Y", "u": { "a": 9 }, "f": 5 }
        "#,
    );
    let root = Table::root(parser.buffer());
    assert_eq!(root.scalar::<u8>(field_index_to_offset(0), 0), 2);
    let payload = root.table(field_index_to_offset(1)).expect("u missing");
    assert_eq!(payload.scalar::<i32>(field_index_to_offset(0), 0), 9);
    assert_eq!(root.scalar::<i32>(field_index_to_offset(2), 0), 5);
}

#[test]
fn deprecated_is_tracked_but_illegal_in_structs() {
    let parser = parse_ok("table T { old: int (deprecated); }");
    let def = parser.structs().lookup("T").expect("T missing");
    assert!(def.fields.lookup("old").map(|f| f.deprecated) == Some(true));

    let err = parse_err("struct S { old: int (deprecated); }");
    assert!(err.ends_with("can't deprecate fields in a struct"));
}

#[test]
fn force_align_overrides_minalign() {
    let parser = parse_ok("struct S (force_align: 8) { x: int; } table T { s: S; } root_type T;");
    let def = parser.structs().lookup("S").expect("S missing");
    assert_eq!(def.minalign, 8);
    assert_eq!(def.bytesize, 8);

    let err = parse_err("struct S (force_align: 3) { x: int; }");
    assert!(err.contains("force_align must be a power of two"));
    let err = parse_err("struct S (force_align: 2) { x: int; }");
    assert!(err.contains("force_align must be a power of two"));
}

#[test]
fn nested_flatbuffer_requires_ubyte_vector() {
    parse_ok(r#"table N { x: int; } table T { buf: [ubyte] (nested_flatbuffer: "N"); }"#);

    let err = parse_err(r#"table T { buf: int (nested_flatbuffer: "T"); }"#);
    assert!(err.ends_with("nested_flatbuffer attribute may only apply to a vector of ubyte"));
    let err = parse_err("table T { buf: [ubyte] (nested_flatbuffer: 1); }");
    assert!(err.ends_with("nested_flatbuffer attribute must be a string (the root type)"));
    // the named inner root must be declared somewhere
    let err = parse_err(r#"table T { buf: [ubyte] (nested_flatbuffer: "Missing"); }"#);
    assert!(err.ends_with("type referenced but not defined: Missing"));
}

#[test]
fn root_type_rules() {
    let err = parse_err("table T { x: int; } root_type U;");
    assert!(err.ends_with("unknown root type: U"));
    let err = parse_err("struct S { x: int; } root_type S;");
    assert!(err.ends_with("root type must be a table"));
    let err = parse_err(r#"table T { x: int; } { "x": 1 }"#);
    assert!(err.ends_with("no root type set to parse json with"));
    let err = parse_err(r#"table T { x: int; } root_type T; { "x": 1 } { "x": 2 }"#);
    assert!(err.ends_with("cannot have more than one json object in a file"));
}

#[test]
fn empty_root_object_is_accepted() {
    let parser = parse_ok("table T { x: int; } root_type T; {}");
    let root = Table::root(parser.buffer());
    assert!(!root.present(field_index_to_offset(0)));
    assert_eq!(root.scalar::<i32>(field_index_to_offset(0), 0), 0);
}

#[test]
fn duplicate_names_are_rejected() {
    let err = parse_err("table T { x: int; } table T { y: int; }");
    assert!(err.ends_with("datatype already exists: T"));
    let err = parse_err("table T { x: int; x: int; }");
    assert!(err.ends_with("field already exists: x"));
    let err = parse_err("enum E : int { A } enum E : int { B }");
    assert!(err.ends_with("enum already exists: E"));
    let err = parse_err("enum E : int { A, A }");
    assert!(err.ends_with("enum value already exists: A"));
}

#[test]
fn unknown_fields_and_type_mismatches_are_rejected() {
    let err = parse_err(r#"table T { x: int; } root_type T; { "y": 1 }"#);
    assert!(err.ends_with("unknown field: y"));
    let err = parse_err(r#"table T { x: int; } root_type T; { "x": 1.5 }"#);
    assert!(err.ends_with("type mismatch: expecting: int, found: float"));
}

#[test]
fn field_names_may_be_bare_or_quoted() {
    for object in ["{ x: 1 }", r#"{ "x": 1 }"#] {
        let parser = parse_ok(&format!("table T {{ x: int; }} root_type T; {}", object));
        let root = Table::root(parser.buffer());
        assert_eq!(root.scalar::<i32>(field_index_to_offset(0), 0), 1);
    }
}

#[test]
fn namespaces_replace_the_current_scope() {
    let parser = parse_ok("namespace a.b.c; table T { x: int; }");
    assert_eq!(parser.namespace(), ["a", "b", "c"]);
}

#[test]
fn doc_comments_attach_to_declarations() {
    let parser = parse_ok(
        "/// A thing.\ntable T {\n  /// Its value.\n  x: int;\n}\n/// Kinds.\nenum E : int { A }\n",
    );
    let def = parser.structs().lookup("T").expect("T missing");
    assert_eq!(def.doc, " A thing.");
    assert_eq!(
        def.fields.lookup("x").map(|f| f.doc.as_str()),
        Some(" Its value.")
    );
    let def = parser.enums().lookup("E").expect("E missing");
    assert_eq!(def.doc, " Kinds.");
}

#[test]
fn registries_persist_across_parse_calls() {
    let mut parser = Parser::new();
    parser
        .parse("table T { x: int; } root_type T;")
        .expect("schema parse failed");
    parser.parse(r#"{ "x": 42 }"#).expect("payload parse failed");
    let root = Table::root(parser.buffer());
    assert_eq!(root.scalar::<i32>(field_index_to_offset(0), 0), 42);
}

#[test]
fn set_root_type_by_api() {
    let mut parser = Parser::new();
    parser.parse("table T { x: int; }").expect("parse failed");
    assert!(!parser.set_root_type("U"));
    assert!(parser.set_root_type("T"));
    parser.parse(r#"{ "x": 3 }"#).expect("payload parse failed");
    let root = Table::root(parser.buffer());
    assert_eq!(root.scalar::<i32>(field_index_to_offset(0), 0), 3);
}

#[test]
fn errors_carry_the_source_line() {
    let err = parse_err("table T {\n  x: int;\n  x: int;\n}");
    assert!(err.starts_with("line 3: "), "got: {}", err);
}

#[test]
fn schema_dump_lists_definitions_in_order() {
    let parser = parse_ok("enum E : int { A } table B { e: E; } table A { b: B; }");
    let json = tablewire::schema_to_json(&parser);
    let b_at = json.find("\"B\"").expect("B missing from dump");
    let a_at = json.find("\"A\"").expect("A missing from dump");
    assert!(b_at < a_at, "declaration order not preserved: {}", json);
}
