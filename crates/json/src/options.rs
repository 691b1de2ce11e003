//! Parser options
//!
//! # Example
//!
//! ```rust
//! use dy_json::{ParserOptions, parse_with};
//!
//! let options = ParserOptions::new()
//!     .with_max_depth(16)
//!     .with_trailing_commas(true);
//!
//! let value = parse_with("[1, 2,]", &options).unwrap();
//! assert_eq!(value.length().unwrap(), 2);
//! ```

/// Default nesting limit for arrays and objects
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default read size for [`crate::parse_reader`]
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Deepest allowed nesting of arrays and objects
    pub max_depth: usize,

    /// Bytes requested per read when parsing from a reader
    pub chunk_size: usize,

    /// Accept a comma before the closing `]` or `}`
    pub allow_trailing_commas: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            chunk_size: DEFAULT_CHUNK_SIZE,
            allow_trailing_commas: false,
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Zero is raised to one
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_trailing_commas(mut self, allow: bool) -> Self {
        self.allow_trailing_commas = allow;
        self
    }
}
