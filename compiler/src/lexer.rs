use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::error::WireError;
use crate::parser::Parser;
use crate::types::BaseType;

lazy_static! {
    /// Base-type keywords, matched before declaration keywords.
    static ref BASE_TYPE_KEYWORDS: HashMap<&'static str, BaseType> = [
        ("bool", BaseType::Bool),
        ("byte", BaseType::Byte),
        ("ubyte", BaseType::UByte),
        ("short", BaseType::Short),
        ("ushort", BaseType::UShort),
        ("int", BaseType::Int),
        ("uint", BaseType::UInt),
        ("long", BaseType::Long),
        ("ulong", BaseType::ULong),
        ("float", BaseType::Float),
        ("double", BaseType::Double),
        ("string", BaseType::String),
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Eof,
    StringConstant,
    IntegerConstant,
    FloatConstant,
    Identifier,
    Table,
    Struct,
    Enum,
    Union,
    Namespace,
    RootType,
    BaseType(BaseType),
    /// One of the single-character tokens `{ } ( ) [ ] , : ; = .`
    Char(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of file"),
            Token::StringConstant => write!(f, "string constant"),
            Token::IntegerConstant => write!(f, "integer constant"),
            Token::FloatConstant => write!(f, "float constant"),
            Token::Identifier => write!(f, "identifier"),
            Token::Table => write!(f, "table"),
            Token::Struct => write!(f, "struct"),
            Token::Enum => write!(f, "enum"),
            Token::Union => write!(f, "union"),
            Token::Namespace => write!(f, "namespace"),
            Token::RootType => write!(f, "root_type"),
            Token::BaseType(base) => write!(f, "{}", base.name()),
            Token::Char(c) => write!(f, "{}", c),
        }
    }
}

impl Parser {
    /// The byte under the cursor; the end of the source reads as NUL.
    fn cur(&self) -> u8 {
        self.source.get(self.cursor).copied().unwrap_or(0)
    }

    /// Advance to the next token. Skips whitespace and comments, accumulates
    /// doc comments, and leaves the token's text in `attribute`.
    pub(crate) fn next(&mut self) -> Result<(), WireError> {
        self.doc_comment.clear();
        // the start of the source counts as a fresh line
        let mut seen_newline = self.cursor == 0;
        loop {
            let c = self.cur();
            self.cursor += 1;
            match c {
                0 => {
                    // leave the cursor in place so re-reads stay at Eof
                    self.cursor -= 1;
                    self.token = Token::Eof;
                    return Ok(());
                }
                b' ' | b'\r' | b'\t' => {}
                b'\n' => {
                    self.line += 1;
                    seen_newline = true;
                }
                b'{' | b'}' | b'(' | b')' | b'[' | b']' | b',' | b':' | b';' | b'=' => {
                    self.token = Token::Char(c as char);
                    return Ok(());
                }
                b'.' => {
                    if !self.cur().is_ascii_digit() {
                        self.token = Token::Char('.');
                        return Ok(());
                    }
                    return Err(self.error("floating point constant can't start with \".\""));
                }
                b'"' => return self.string_constant(),
                b'/' if self.cur() == b'/' => {
                    self.cursor += 1;
                    let doc = self.cur() == b'/';
                    if doc {
                        if !seen_newline {
                            return Err(
                                self.error("a documentation comment should be on a line on its own")
                            );
                        }
                        self.cursor += 1;
                    }
                    let start = self.cursor;
                    while self.cur() != 0 && self.cur() != b'\n' {
                        self.cursor += 1;
                    }
                    if doc {
                        self.doc_comment
                            .push_str(&String::from_utf8_lossy(&self.source[start..self.cursor]));
                    }
                }
                _ => {
                    if c.is_ascii_alphabetic() {
                        return self.identifier_or_keyword();
                    }
                    if c.is_ascii_digit() || c == b'-' {
                        return self.number_constant();
                    }
                    let printable = (b' '..=b'~').contains(&c);
                    let ch = if printable {
                        (c as char).to_string()
                    } else {
                        format!("code: {}", c)
                    };
                    return Err(self.error(format!("illegal character: {}", ch)));
                }
            }
        }
    }

    /// The cursor sits just past the opening quote.
    fn string_constant(&mut self) -> Result<(), WireError> {
        let mut bytes = Vec::new();
        while self.cur() != b'"' {
            // control characters are rejected; UTF-8 continuation bytes pass
            if self.cur() < 0x20 {
                return Err(self.error("illegal character in string constant"));
            }
            if self.cur() == b'\\' {
                self.cursor += 1;
                match self.cur() {
                    b'n' => bytes.push(b'\n'),
                    b't' => bytes.push(b'\t'),
                    b'r' => bytes.push(b'\r'),
                    b'"' => bytes.push(b'"'),
                    b'\\' => bytes.push(b'\\'),
                    _ => return Err(self.error("unknown escape code in string constant")),
                }
                self.cursor += 1;
            } else {
                bytes.push(self.cur());
                self.cursor += 1;
            }
        }
        self.cursor += 1;
        self.attribute = String::from_utf8_lossy(&bytes).into_owned();
        self.token = Token::StringConstant;
        Ok(())
    }

    /// The cursor sits just past the first letter.
    fn identifier_or_keyword(&mut self) -> Result<(), WireError> {
        let start = self.cursor - 1;
        while self.cur().is_ascii_alphanumeric() || self.cur() == b'_' {
            self.cursor += 1;
        }
        self.attribute = String::from_utf8_lossy(&self.source[start..self.cursor]).into_owned();
        if let Some(&base) = BASE_TYPE_KEYWORDS.get(self.attribute.as_str()) {
            self.token = Token::BaseType(base);
            return Ok(());
        }
        // boolean constants become integers, which keeps the value parser on
        // a single path
        if self.attribute == "true" || self.attribute == "false" {
            self.attribute = if self.attribute == "true" { "1" } else { "0" }.to_owned();
            self.token = Token::IntegerConstant;
            return Ok(());
        }
        self.token = match self.attribute.as_str() {
            "table" => Token::Table,
            "struct" => Token::Struct,
            "enum" => Token::Enum,
            "union" => Token::Union,
            "namespace" => Token::Namespace,
            "root_type" => Token::RootType,
            _ => Token::Identifier,
        };
        Ok(())
    }

    /// The cursor sits just past the first digit or sign.
    fn number_constant(&mut self) -> Result<(), WireError> {
        let start = self.cursor - 1;
        while self.cur().is_ascii_digit() {
            self.cursor += 1;
        }
        if self.cur() == b'.' {
            self.cursor += 1;
            while self.cur().is_ascii_digit() {
                self.cursor += 1;
            }
            // scientific notation, the same format in JSON and in Rust floats
            if self.cur() == b'e' || self.cur() == b'E' {
                self.cursor += 1;
                if self.cur() == b'+' || self.cur() == b'-' {
                    self.cursor += 1;
                }
                while self.cur().is_ascii_digit() {
                    self.cursor += 1;
                }
            }
            self.token = Token::FloatConstant;
        } else {
            self.token = Token::IntegerConstant;
        }
        self.attribute = String::from_utf8_lossy(&self.source[start..self.cursor]).into_owned();
        Ok(())
    }

    /// Consume the current token if it matches.
    pub(crate) fn is_next(&mut self, t: Token) -> Result<bool, WireError> {
        let matched = self.token == t;
        if matched {
            self.next()?;
        }
        Ok(matched)
    }

    /// Require the current token to match, then consume it.
    pub(crate) fn expect(&mut self, t: Token) -> Result<(), WireError> {
        if self.token != t {
            return Err(self.error(format!("expecting: {} instead got: {}", t, self.token)));
        }
        self.next()
    }
}
