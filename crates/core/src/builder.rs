//! StringBuilder - deferred concatenation
//!
//! Building a representation of a nested container by concatenating the
//! pieces at every level is quadratic. A `StringBuilder` instead records the
//! pieces (borrowed slices, owned buffers, or shared [`Str`]s) and joins
//! them once, in [`StringBuilder::build`], with a single allocation sized by
//! [`StringBuilder::total_size`].

use crate::string::Str;
use std::fmt;

/// One piece of a [`StringBuilder`]
pub enum Part<'a> {
    /// Bytes owned by the caller
    Borrowed(&'a [u8]),
    /// Bytes owned by the builder
    Owned(Box<[u8]>),
    /// A string kept alive by the builder
    Shared(Str),
}

impl Part<'_> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Part::Borrowed(b) => b,
            Part::Owned(b) => b,
            Part::Shared(s) => s.as_bytes(),
        }
    }
}

#[derive(Default)]
pub struct StringBuilder<'a> {
    parts: Vec<Part<'a>>,
    size: usize,
}

impl<'a> StringBuilder<'a> {
    pub fn new() -> Self {
        StringBuilder {
            parts: Vec::new(),
            size: 0,
        }
    }

    /// A builder whose first part is `bytes`
    pub fn from_part(bytes: &'a [u8]) -> Self {
        let mut bs = StringBuilder::new();
        bs.append(bytes);
        bs
    }

    fn push(&mut self, part: Part<'a>) -> &mut Self {
        self.size += part.as_bytes().len();
        self.parts.push(part);
        self
    }

    pub fn append(&mut self, bytes: &'a [u8]) -> &mut Self {
        self.push(Part::Borrowed(bytes))
    }

    pub fn append_owned(&mut self, bytes: impl Into<Box<[u8]>>) -> &mut Self {
        self.push(Part::Owned(bytes.into()))
    }

    /// Append a string, holding a reference to it until the builder is dropped
    pub fn append_str(&mut self, s: Str) -> &mut Self {
        self.push(Part::Shared(s))
    }

    /// Format into a new owned part
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> &mut Self {
        let text = fmt::format(args);
        self.append_owned(text.into_bytes())
    }

    /// Sum of all part lengths
    pub fn total_size(&self) -> usize {
        self.size
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn parts(&self) -> &[Part<'a>] {
        &self.parts
    }

    /// Copy as many bytes as fit into `dest`; returns the number copied
    pub fn copy_into(&self, dest: &mut [u8]) -> usize {
        let mut written = 0;
        for part in &self.parts {
            let bytes = part.as_bytes();
            let room = dest.len() - written;
            let n = bytes.len().min(room);
            dest[written..written + n].copy_from_slice(&bytes[..n]);
            written += n;
            if n < bytes.len() {
                break;
            }
        }
        written
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.size];
        self.copy_into(&mut out);
        out
    }

    /// Join all parts into one new string
    pub fn build(&self) -> Str {
        Str::from(self.to_bytes())
    }

    /// Drop the builder; owned and shared parts are released, borrowed
    /// parts are left to their owners.
    pub fn free(self) {}

    /// Drop the builder, handing every borrowed part to `release` so a
    /// caller that lent out buffers it owns can reclaim them.
    pub fn free_with_content(self, mut release: impl FnMut(&'a [u8])) {
        for part in self.parts {
            if let Part::Borrowed(bytes) = part {
                release(bytes);
            }
        }
    }
}

impl fmt::Write for StringBuilder<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append_owned(s.as_bytes());
        Ok(())
    }
}
