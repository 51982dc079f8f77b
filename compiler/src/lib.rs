//! tablewire-compiler
//!
//! This crate implements:
//!  1) A single-lookahead lexer + recursive-descent parser for tablewire
//!     schema text,
//!  2) Schema registries (tables, fixed structs, enums, unions) with
//!     forward-reference support,
//!  3) A JSON-to-binary encoder that drives the `tablewire-schema` builder
//!     while the schema is still being consumed,
//!  4) Post-parse verification, and error types (`WireError`).

pub mod error;
pub mod lexer;
pub mod parser;
pub mod types;
pub mod verifier;

pub use error::WireError;
pub use parser::Parser;
