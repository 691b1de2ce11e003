//! dy JSON: a streaming JSON parser producing dy values
//!
//! Objects become [`dy_core::Dict`]s with interned string keys, arrays
//! become [`dy_core::List`]s, integers that fit `i64` stay integers and
//! everything else numeric becomes a float.
//!
//! Input can be whole ([`parse`], [`parse_bytes`]) or arrive in chunks
//! ([`parse_chunked`], [`parse_reader`]). A token cut by the end of a chunk
//! is finished once the next chunk has been appended, so chunk boundaries
//! may fall anywhere.
//!
//! ```rust
//! let value = dy_json::parse(r#"{"a": [1, 2.5, true, null, "x"]}"#).unwrap();
//! let a = value.get_item_str("a").unwrap();
//! assert_eq!(a.length().unwrap(), 5);
//! ```
//!
//! Errors are [`dy_core::Exception`]s whose ids sit under
//! [`PARSE_ERROR`]; the message ends with the line and column, and the
//! [`Location`] is attached as exception data.
//!
//! # Modules
//!
//! - `token`: Tokenizer with end-of-chunk detection
//! - `unescape`: String body decoding
//! - `parser`: Recursive descent over tokens
//! - `source`: Chunk sources (callbacks, readers)
//! - `options`: Parser options

pub mod options;
pub mod parser;
pub mod source;
pub mod token;
pub mod unescape;

pub use options::ParserOptions;
pub use parser::Parser;
pub use source::{ChunkSource, Complete, ReaderSource, Refill};
pub use token::{Location, Token, TokenKind, Tokenizer};

use dy_core::{Result, Value};
use std::io::Read;

pub const PARSE_ERROR: &str = "dy.json.ParseError";
pub const TOKEN_ERROR: &str = "dy.json.ParseError.TokenError";
pub const STRING_PARSE_ERROR: &str = "dy.json.ParseError.StringParseError";
pub const READ_ERROR: &str = "dy.json.ReadError";

/// Parse a complete JSON document
pub fn parse(text: &str) -> Result<Value> {
    parse_bytes(text.as_bytes())
}

/// Parse a complete JSON document given as bytes.
///
/// String contents are kept as bytes and need not be UTF-8.
pub fn parse_bytes(bytes: &[u8]) -> Result<Value> {
    Parser::new(bytes, ParserOptions::default()).parse_document()
}

pub fn parse_with(text: &str, options: &ParserOptions) -> Result<Value> {
    Parser::new(text.as_bytes(), options.clone()).parse_document()
}

/// Parse a document that arrives in pieces.
///
/// `refill` is called whenever `first` (and everything appended since) has
/// been consumed; `None` ends the input.
pub fn parse_chunked<F>(first: Vec<u8>, refill: F) -> Result<Value>
where
    F: FnMut() -> Option<Vec<u8>>,
{
    Parser::streaming(first, Refill(refill), ParserOptions::default()).parse_document()
}

/// Parse a document read from `reader` in fixed-size chunks
pub fn parse_reader<R: Read>(reader: R) -> Result<Value> {
    parse_reader_with(reader, &ParserOptions::default())
}

pub fn parse_reader_with<R: Read>(reader: R, options: &ParserOptions) -> Result<Value> {
    let source = ReaderSource::new(reader, options.chunk_size);
    Parser::from_source(source, options.clone()).parse_document()
}
