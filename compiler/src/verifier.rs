//! Post-parse schema checks.

use crate::error::WireError;
use crate::parser::Parser;

/// Verify the finished registries: every forward reference must have been
/// resolved by a real declaration, and union members must be tables since a
/// union payload is transmitted by offset.
pub(crate) fn check_schema(parser: &Parser) -> Result<(), WireError> {
    for (name, def) in parser.structs().iter() {
        if def.predecl {
            return Err(parser.error(format!("type referenced but not defined: {}", name)));
        }
    }
    for (_, def) in parser.enums().iter() {
        if !def.is_union {
            continue;
        }
        for (_, val) in def.vals.iter() {
            if let Some(member) = val.struct_def {
                if parser.structs().get(member.0).fixed {
                    return Err(
                        parser.error(format!("only tables can be union elements: {}", val.name))
                    );
                }
            }
        }
    }
    Ok(())
}
