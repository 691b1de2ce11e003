//! JSON tokenizer
//!
//! Scans a byte buffer that may hold only part of the document. When a
//! token runs into the end of a buffer that is not marked complete, the
//! scan stops with [`ScanError::EndOfChunk`] without consuming anything;
//! the caller appends the next chunk with [`Tokenizer::feed`] (or marks the
//! input complete with [`Tokenizer::finish`]) and asks again. Strings and
//! numbers remember how far they got, so the retry continues from there and
//! a long token costs linear time however many chunks it spans.
//!
//! Locations are 1-based; columns count bytes.

use crate::unescape;
use crate::{STRING_PARSE_ERROR, TOKEN_ERROR};
use dy_core::Str;
use std::borrow::Cow;
use std::fmt;

/// Position in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Byte offset from the start of the document
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn start() -> Self {
        Location {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self, bytes: usize) {
        self.offset += bytes;
        self.column += bytes;
    }

    fn newline(&mut self) {
        self.offset += 1;
        self.line += 1;
        self.column = 1;
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    Space,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Colon,
    Comma,
    /// Decoded string contents
    String(Str),
    Integer(i64),
    Float(f64),
    Null,
    True,
    False,
}

impl TokenKind {
    /// How the token is named in error messages
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Eof => "end of input",
            TokenKind::Space => "whitespace",
            TokenKind::BraceOpen => "'{'",
            TokenKind::BraceClose => "'}'",
            TokenKind::BracketOpen => "'['",
            TokenKind::BracketClose => "']'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::String(_) => "string",
            TokenKind::Integer(_) => "integer",
            TokenKind::Float(_) => "float",
            TokenKind::Null => "'null'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// The buffer ended inside a token; feed more input and retry
    EndOfChunk,
    Invalid {
        errid: &'static str,
        message: String,
        location: Location,
    },
}

pub struct Tokenizer<'a> {
    buf: Cow<'a, [u8]>,
    pos: usize,
    /// Bytes past `pos` already found to belong to a cut string or number
    resume: usize,
    location: Location,
    complete: bool,
}

impl<'a> Tokenizer<'a> {
    /// A tokenizer over a whole document
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer {
            buf: Cow::Borrowed(input),
            pos: 0,
            resume: 0,
            location: Location::start(),
            complete: true,
        }
    }

    /// A tokenizer over the first chunk of a document; more follows via
    /// [`Tokenizer::feed`] until [`Tokenizer::finish`]
    pub fn streaming(first: Vec<u8>) -> Self {
        Tokenizer {
            buf: Cow::Owned(first),
            pos: 0,
            resume: 0,
            location: Location::start(),
            complete: false,
        }
    }

    /// Append the next chunk, discarding everything already scanned
    pub fn feed(&mut self, chunk: &[u8]) {
        let buf = self.buf.to_mut();
        if self.pos > 0 {
            buf.drain(..self.pos);
            self.pos = 0;
        }
        buf.extend_from_slice(chunk);
    }

    /// No more chunks: the end of the buffer is the end of the document
    pub fn finish(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Location of the next unscanned byte
    pub fn location(&self) -> Location {
        self.location
    }

    /// Next token that is not whitespace
    pub fn next_token(&mut self) -> Result<Token, ScanError> {
        loop {
            let token = self.scan()?;
            if token.kind != TokenKind::Space {
                return Ok(token);
            }
        }
    }

    /// Next token, whitespace included
    pub fn scan(&mut self) -> Result<Token, ScanError> {
        let location = self.location;
        let Some(&first) = self.buf.get(self.pos) else {
            return if self.complete {
                Ok(Token {
                    kind: TokenKind::Eof,
                    location,
                })
            } else {
                Err(ScanError::EndOfChunk)
            };
        };

        let (kind, len) = match first {
            b' ' | b'\t' | b'\r' | b'\n' => return Ok(self.space()),
            b'{' => (TokenKind::BraceOpen, 1),
            b'}' => (TokenKind::BraceClose, 1),
            b'[' => (TokenKind::BracketOpen, 1),
            b']' => (TokenKind::BracketClose, 1),
            b':' => (TokenKind::Colon, 1),
            b',' => (TokenKind::Comma, 1),
            b'"' => self.string()?,
            b'-' | b'0'..=b'9' => self.number()?,
            b't' => self.literal(b"true", TokenKind::True)?,
            b'f' => self.literal(b"false", TokenKind::False)?,
            b'n' => self.literal(b"null", TokenKind::Null)?,
            other => return Err(self.unknown(other, 0)),
        };
        self.pos += len;
        self.resume = 0;
        self.location.advance(len);
        Ok(Token { kind, location })
    }

    /// Consume whitespace; always succeeds since whitespace is never split
    fn space(&mut self) -> Token {
        let location = self.location;
        while let Some(&b) = self.buf.get(self.pos) {
            match b {
                b'\n' => self.location.newline(),
                b' ' | b'\t' | b'\r' => self.location.advance(1),
                _ => break,
            }
            self.pos += 1;
        }
        Token {
            kind: TokenKind::Space,
            location,
        }
    }

    /// Byte `i` past the token start; `Ok(None)` only at the real end of input
    fn at(&self, i: usize) -> Result<Option<u8>, ScanError> {
        match self.buf.get(self.pos + i) {
            Some(&b) => Ok(Some(b)),
            None if self.complete => Ok(None),
            None => Err(ScanError::EndOfChunk),
        }
    }

    fn error(&self, errid: &'static str, message: impl Into<String>, at: usize) -> ScanError {
        let mut location = self.location;
        location.advance(at);
        ScanError::Invalid {
            errid,
            message: message.into(),
            location,
        }
    }

    fn unknown(&self, byte: u8, at: usize) -> ScanError {
        let shown = if byte.is_ascii_graphic() {
            format!("'{}'", byte as char)
        } else {
            format!("byte 0x{:02x}", byte)
        };
        self.error(TOKEN_ERROR, format!("Unknown token {}", shown), at)
    }

    fn literal(&self, word: &[u8], kind: TokenKind) -> Result<(TokenKind, usize), ScanError> {
        for (i, &expected) in word.iter().enumerate() {
            match self.at(i)? {
                Some(b) if b == expected => {}
                Some(b) => return Err(self.unknown(b, i)),
                None => return Err(self.error(TOKEN_ERROR, "Unexpected end of input", i)),
            }
        }
        Ok((kind, word.len()))
    }

    fn digits(&self, mut i: usize) -> Result<usize, ScanError> {
        while let Some(b'0'..=b'9') = self.at(i)? {
            i += 1;
        }
        Ok(i)
    }

    /// Find where the run of number bytes ends before validating it, so a
    /// cut number is only checked once it is whole
    fn number_extent(&mut self) -> Result<(), ScanError> {
        let mut end = self.pos + self.resume;
        while let Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') = self.buf.get(end) {
            end += 1;
        }
        if end == self.buf.len() && !self.complete {
            self.resume = end - self.pos;
            return Err(ScanError::EndOfChunk);
        }
        Ok(())
    }

    fn number(&mut self) -> Result<(TokenKind, usize), ScanError> {
        self.number_extent()?;
        let mut i = 0;
        let mut is_float = false;

        if self.at(i)? == Some(b'-') {
            i += 1;
        }
        match self.at(i)? {
            Some(b'0') => {
                i += 1;
                if let Some(b'0'..=b'9') = self.at(i)? {
                    return Err(self.error(TOKEN_ERROR, "Leading zeros are not allowed", i));
                }
            }
            Some(b'1'..=b'9') => i = self.digits(i + 1)?,
            _ => return Err(self.error(TOKEN_ERROR, "Broken number", i)),
        }

        if self.at(i)? == Some(b'.') {
            is_float = true;
            i += 1;
            let end = self.digits(i)?;
            if end == i {
                return Err(self.error(TOKEN_ERROR, "Broken number (decimals)", i));
            }
            i = end;
        }

        if let Some(b'e' | b'E') = self.at(i)? {
            is_float = true;
            i += 1;
            if let Some(b'+' | b'-') = self.at(i)? {
                i += 1;
            }
            let end = self.digits(i)?;
            if end == i {
                return Err(self.error(TOKEN_ERROR, "Broken number (exponent)", i));
            }
            i = end;
        }

        let bytes = &self.buf[self.pos..self.pos + i];
        let text = std::str::from_utf8(bytes)
            .map_err(|_| self.error(TOKEN_ERROR, "Broken number", 0))?;
        let kind = match (is_float, text.parse::<i64>()) {
            (false, Ok(int)) => TokenKind::Integer(int),
            // Integers beyond i64 degrade to floats
            _ => TokenKind::Float(
                text.parse::<f64>()
                    .map_err(|_| self.error(TOKEN_ERROR, "Broken number", 0))?,
            ),
        };
        Ok((kind, i))
    }

    fn string(&mut self) -> Result<(TokenKind, usize), ScanError> {
        let mut i = self.resume.max(1);
        let closed = loop {
            let byte = match self.at(i) {
                Ok(byte) => byte,
                Err(e) => break Err(e),
            };
            match byte {
                None => {
                    break Err(self.error(STRING_PARSE_ERROR, "Unterminated string", i));
                }
                Some(b'"') => break Ok(()),
                // Only the escaped byte's presence matters here; the
                // decoder validates the sequence
                Some(b'\\') => match self.at(i + 1) {
                    Ok(Some(_)) => i += 2,
                    Ok(None) => {
                        break Err(self.error(STRING_PARSE_ERROR, "Unterminated string", i + 1));
                    }
                    Err(e) => break Err(e),
                },
                Some(b) if b < 0x20 => {
                    break Err(self.error(
                        STRING_PARSE_ERROR,
                        "Control character in string",
                        i,
                    ));
                }
                Some(_) => i += 1,
            }
        };
        if let Err(e) = closed {
            if e == ScanError::EndOfChunk {
                // Retry from the byte that was missing, or from the backslash
                self.resume = i;
            }
            return Err(e);
        }

        let body = &self.buf[self.pos + 1..self.pos + i];
        let decoded = unescape::decode(body)
            .map_err(|e| self.error(STRING_PARSE_ERROR, e.message, 1 + e.offset))?;
        Ok((TokenKind::String(decoded), i + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut t = Tokenizer::new(input.as_bytes());
        let mut out = Vec::new();
        loop {
            let tok = t.next_token().unwrap();
            if tok.kind == TokenKind::Eof {
                return out;
            }
            out.push(tok.kind);
        }
    }

    fn scan_error(input: &str) -> (String, Location) {
        let mut t = Tokenizer::new(input.as_bytes());
        loop {
            match t.next_token() {
                Ok(tok) if tok.kind == TokenKind::Eof => panic!("no error in {:?}", input),
                Ok(_) => continue,
                Err(ScanError::Invalid {
                    message, location, ..
                }) => return (message, location),
                Err(ScanError::EndOfChunk) => panic!("complete input reported end of chunk"),
            }
        }
    }

    #[test]
    fn test_punctuation_and_literals() {
        assert_eq!(
            kinds("{ } [ ] : , true false null"),
            vec![
                TokenKind::BraceOpen,
                TokenKind::BraceClose,
                TokenKind::BracketOpen,
                TokenKind::BracketClose,
                TokenKind::Colon,
                TokenKind::Comma,
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("0 -12 3.25 1e3 -2.5E-2 9223372036854775807"),
            vec![
                TokenKind::Integer(0),
                TokenKind::Integer(-12),
                TokenKind::Float(3.25),
                TokenKind::Float(1000.0),
                TokenKind::Float(-0.025),
                TokenKind::Integer(i64::MAX),
            ]
        );
    }

    #[test]
    fn test_integer_overflow_becomes_float() {
        assert_eq!(
            kinds("18446744073709551616"),
            vec![TokenKind::Float(18446744073709551616.0)]
        );
    }

    #[test]
    fn test_broken_numbers() {
        assert_eq!(scan_error("01").0, "Leading zeros are not allowed");
        assert_eq!(scan_error("1.").0, "Broken number (decimals)");
        assert_eq!(scan_error("1e+").0, "Broken number (exponent)");
        assert_eq!(scan_error("-x").0, "Broken number");
    }

    #[test]
    fn test_locations() {
        let mut t = Tokenizer::new(b"[\n  1,\n\t\"x\"]");
        let locs: Vec<(usize, usize)> = std::iter::from_fn(|| {
            let tok = t.next_token().ok()?;
            (tok.kind != TokenKind::Eof).then_some((tok.location.line, tok.location.column))
        })
        .collect();
        assert_eq!(locs, vec![(1, 1), (2, 3), (2, 4), (3, 2), (3, 5)]);
    }

    #[test]
    fn test_unknown_token_location() {
        let (message, location) = scan_error("[1,\n  @]");
        assert_eq!(message, "Unknown token '@'");
        assert_eq!((location.line, location.column), (2, 3));

        let (message, location) = scan_error("  trux");
        assert_eq!(message, "Unknown token 'x'");
        assert_eq!(location.column, 6);
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""plain" "a\"b" "é""#),
            vec![
                TokenKind::String(Str::from("plain")),
                TokenKind::String(Str::from("a\"b")),
                TokenKind::String(Str::from("é")),
            ]
        );
    }

    #[test]
    fn test_string_errors() {
        assert_eq!(scan_error("\"abc").0, "Unterminated string");
        assert_eq!(scan_error("\"a\nb\"").0, "Control character in string");
        let (message, location) = scan_error(r#"  "ab\q""#);
        assert_eq!(message, "Unknown escape sequence");
        assert_eq!(location.column, 6);
    }

    #[test]
    fn test_end_of_chunk_is_not_consumed() {
        let mut t = Tokenizer::streaming(b"[12".to_vec());
        assert_eq!(t.next_token().unwrap().kind, TokenKind::BracketOpen);
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        t.feed(b"34, tr");
        assert_eq!(t.next_token().unwrap().kind, TokenKind::Integer(1234));
        assert_eq!(t.next_token().unwrap().kind, TokenKind::Comma);
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        t.feed(b"ue");
        let tok = t.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::True);
        assert_eq!(tok.location.column, 8);
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        t.finish();
        assert_eq!(t.next_token().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_cut_string_resumes_where_it_stopped() {
        let mut t = Tokenizer::streaming(b"[\"abc".to_vec());
        assert_eq!(t.next_token().unwrap().kind, TokenKind::BracketOpen);
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        assert_eq!(t.resume, 4);
        t.feed(b"de\\");
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        // Stopped on the backslash whose escaped byte is missing
        assert_eq!(t.resume, 6);
        t.feed(b"\"f\"]");
        let tok = t.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::String(Str::from("abcde\"f")));
        assert_eq!(tok.location.column, 2);
        assert_eq!(t.resume, 0);
        assert_eq!(t.next_token().unwrap().kind, TokenKind::BracketClose);
    }

    #[test]
    fn test_cut_number_resumes_where_it_stopped() {
        let mut t = Tokenizer::streaming(b"-12".to_vec());
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        assert_eq!(t.resume, 3);
        t.feed(b"3.5e");
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        assert_eq!(t.resume, 7);
        t.feed(b"2,");
        assert_eq!(t.next_token().unwrap().kind, TokenKind::Float(-12350.0));
        assert_eq!(t.next_token().unwrap().kind, TokenKind::Comma);
    }

    #[test]
    fn test_cut_number_completed_by_finish() {
        let mut t = Tokenizer::streaming(b"1e".to_vec());
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        t.finish();
        match t.next_token() {
            Err(ScanError::Invalid { message, .. }) => {
                assert_eq!(message, "Broken number (exponent)")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_split_string_and_escape() {
        let mut t = Tokenizer::streaming(b"\"ab\\".to_vec());
        assert_eq!(t.next_token(), Err(ScanError::EndOfChunk));
        t.feed(b"n\"");
        t.finish();
        assert_eq!(
            t.next_token().unwrap().kind,
            TokenKind::String(Str::from("ab\n"))
        );
    }
}
