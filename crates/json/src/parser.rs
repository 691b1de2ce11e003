//! Recursive-descent parser building dy values
//!
//! The parser pulls tokens from a [`Tokenizer`]; whenever the tokenizer
//! reaches the end of its buffer mid-token it asks the [`ChunkSource`] for
//! more input and retries.

use crate::source::{ChunkSource, Complete};
use crate::token::{Location, ScanError, Token, TokenKind, Tokenizer};
use crate::{PARSE_ERROR, ParserOptions};
use dy_core::{Dict, Exception, List, Result, Value};

/// Build a parse error carrying `location` both in its message and as data
pub fn parse_error(errid: &'static str, message: &str, location: Location) -> Exception {
    tracing::debug!(errid, message, %location, "json parse error");
    let exc = Exception::new(errid, format!("{} ({})", message, location));
    exc.set_data(location);
    exc
}

pub struct Parser<'a, S: ChunkSource = Complete> {
    tokens: Tokenizer<'a>,
    source: S,
    options: ParserOptions,
    depth: usize,
}

impl<'a> Parser<'a, Complete> {
    /// Parser over a whole document held in memory
    pub fn new(input: &'a [u8], options: ParserOptions) -> Self {
        Parser {
            tokens: Tokenizer::new(input),
            source: Complete,
            options,
            depth: 0,
        }
    }
}

impl<S: ChunkSource> Parser<'static, S> {
    /// Parser that starts with `first` and pulls the rest from `source`
    pub fn streaming(first: Vec<u8>, source: S, options: ParserOptions) -> Self {
        Parser {
            tokens: Tokenizer::streaming(first),
            source,
            options,
            depth: 0,
        }
    }

    /// Parser that pulls all of its input from `source`
    pub fn from_source(source: S, options: ParserOptions) -> Self {
        Parser::streaming(Vec::new(), source, options)
    }
}

impl<S: ChunkSource> Parser<'_, S> {
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Location of the next unread byte
    pub fn location(&self) -> Location {
        self.tokens.location()
    }

    /// Parse exactly one value; anything but whitespace after it is an error
    pub fn parse_document(&mut self) -> Result<Value> {
        let token = self.next_token()?;
        let value = self.parse_value(token, "value")?;
        let rest = self.next_token()?;
        if rest.kind != TokenKind::Eof {
            return Err(self.unexpected(&rest, "end of input"));
        }
        Ok(value)
    }

    /// Parse the next of a sequence of whitespace-separated values,
    /// or `None` at the end of input
    pub fn next_value(&mut self) -> Result<Option<Value>> {
        let token = self.next_token()?;
        if token.kind == TokenKind::Eof {
            return Ok(None);
        }
        self.parse_value(token, "value").map(Some)
    }

    fn next_token(&mut self) -> Result<Token> {
        loop {
            match self.tokens.next_token() {
                Ok(token) => return Ok(token),
                Err(ScanError::EndOfChunk) => self.refill()?,
                Err(ScanError::Invalid {
                    errid,
                    message,
                    location,
                }) => return Err(parse_error(errid, &message, location)),
            }
        }
    }

    fn refill(&mut self) -> Result<()> {
        match self.source.next_chunk()? {
            Some(chunk) if !chunk.is_empty() => {
                tracing::trace!(bytes = chunk.len(), "json refill");
                self.tokens.feed(&chunk);
            }
            _ => {
                tracing::trace!("json input complete");
                self.tokens.finish();
            }
        }
        Ok(())
    }

    fn unexpected(&self, token: &Token, expected: &str) -> Exception {
        parse_error(
            PARSE_ERROR,
            &format!("Unexpected {}, expected {}", token.kind.describe(), expected),
            token.location,
        )
    }

    fn enter(&mut self, location: Location) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(parse_error(
                PARSE_ERROR,
                &format!("Maximum nesting depth of {} exceeded", self.options.max_depth),
                location,
            ));
        }
        Ok(())
    }

    fn parse_value(&mut self, token: Token, expected: &str) -> Result<Value> {
        match token.kind {
            TokenKind::Null => Ok(Value::None),
            TokenKind::True => Ok(Value::from(true)),
            TokenKind::False => Ok(Value::from(false)),
            TokenKind::Integer(i) => Ok(Value::from(i)),
            TokenKind::Float(f) => Ok(Value::from(f)),
            TokenKind::String(s) => Ok(Value::from(s)),
            TokenKind::BracketOpen => self.parse_array(token.location),
            TokenKind::BraceOpen => self.parse_object(token.location),
            kind => Err(self.unexpected(
                &Token {
                    kind,
                    location: token.location,
                },
                expected,
            )),
        }
    }

    fn parse_array(&mut self, open: Location) -> Result<Value> {
        self.enter(open)?;
        let mut items = Vec::new();

        let mut token = self.next_token()?;
        if token.kind != TokenKind::BracketClose {
            let mut expected = "value or ']'";
            loop {
                items.push(self.parse_value(token, expected)?);

                let separator = self.next_token()?;
                match separator.kind {
                    TokenKind::Comma => {}
                    TokenKind::BracketClose => break,
                    _ => return Err(self.unexpected(&separator, "',' or ']'")),
                }

                token = self.next_token()?;
                if self.options.allow_trailing_commas {
                    if token.kind == TokenKind::BracketClose {
                        break;
                    }
                } else {
                    expected = "value";
                }
            }
        }

        self.depth -= 1;
        Ok(Value::from(List::from_vec(items)))
    }

    fn parse_object(&mut self, open: Location) -> Result<Value> {
        self.enter(open)?;
        let dict = Dict::new();

        let mut token = self.next_token()?;
        if token.kind != TokenKind::BraceClose {
            let mut expected = "key or '}'";
            loop {
                let key = self.parse_key(token, expected)?;

                let colon = self.next_token()?;
                if colon.kind != TokenKind::Colon {
                    return Err(self.unexpected(&colon, "':'"));
                }
                let token_value = self.next_token()?;
                let value = self.parse_value(token_value, "value")?;
                dict.set(key, value)?;

                let separator = self.next_token()?;
                match separator.kind {
                    TokenKind::Comma => {}
                    TokenKind::BraceClose => break,
                    _ => return Err(self.unexpected(&separator, "',' or '}'")),
                }

                token = self.next_token()?;
                if self.options.allow_trailing_commas {
                    if token.kind == TokenKind::BraceClose {
                        break;
                    }
                } else {
                    expected = "key";
                }
            }
        }

        self.depth -= 1;
        Ok(Value::from(dict))
    }

    /// Keys are ordinary values; string keys are interned
    fn parse_key(&mut self, token: Token, expected: &str) -> Result<Value> {
        if let TokenKind::String(s) = &token.kind {
            return Ok(Value::from(s.interned()));
        }
        self.parse_value(token, expected)
    }
}
