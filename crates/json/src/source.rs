//! Chunk sources feeding the streaming parser

use crate::READ_ERROR;
use dy_core::{Exception, Result};
use std::io::{ErrorKind, Read};

/// Supplies the parser with input one chunk at a time.
///
/// `Ok(None)` marks the end of the document. An empty chunk is treated the
/// same way.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Source for input that is already whole
#[derive(Debug, Default, Clone, Copy)]
pub struct Complete;

impl ChunkSource for Complete {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Source backed by a refill callback
pub struct Refill<F>(pub F);

impl<F> ChunkSource for Refill<F>
where
    F: FnMut() -> Option<Vec<u8>>,
{
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok((self.0)())
    }
}

/// Source reading fixed-size chunks from an [`std::io::Read`]
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        ReaderSource {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ChunkSource for ReaderSource<R> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(buf));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(Exception::new(
                        READ_ERROR,
                        format!("Failed to read JSON input: {}", e),
                    ));
                }
            }
        }
    }
}
