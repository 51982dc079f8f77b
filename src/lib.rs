//! tablewire
//!
//! A schema-driven binary serialization frontend: from a single textual
//! source, build an in-memory schema of tables, structs, enums, and unions,
//! and encode JSON object literals embedded in the same source into a
//! length-prefixed binary buffer.
//!
//! ```
//! use tablewire::{field_index_to_offset, Parser, Table};
//!
//! let mut parser = Parser::new();
//! parser
//!     .parse(r#"table Point { x: int; y: int; } root_type Point; { "x": 1, "y": 2 }"#)
//!     .unwrap();
//!
//! let point = Table::root(parser.buffer());
//! assert_eq!(point.scalar::<i32>(field_index_to_offset(0), 0), 1);
//! assert_eq!(point.scalar::<i32>(field_index_to_offset(1), 0), 2);
//! ```

use serde::Serialize;

pub use tablewire_compiler::types::{
    BaseType, EnumDef, EnumVal, FieldDef, StructDef, SymbolTable, Type, Value,
};
pub use tablewire_compiler::{Parser, WireError};
pub use tablewire_schema::{field_index_to_offset, Builder, Scalar, Table, Vector};

/// Dump the parsed schema registries as pretty-printed JSON.
pub fn schema_to_json(parser: &Parser) -> String {
    #[derive(Serialize)]
    struct SchemaDump<'a> {
        structs: &'a SymbolTable<StructDef>,
        enums: &'a SymbolTable<EnumDef>,
    }
    serde_json::to_string_pretty(&SchemaDump {
        structs: parser.structs(),
        enums: parser.enums(),
    })
    .unwrap()
}
