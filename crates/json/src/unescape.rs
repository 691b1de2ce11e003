//! String body decoding
//!
//! Bodies without a backslash are copied straight into a [`Str`]. Otherwise
//! the body is split into runs: unescaped runs are borrowed from the input,
//! simple escapes map to static one-byte slices, and `\uXXXX` escapes are
//! encoded into the thread-local scratch arena. The runs are joined once by
//! a [`StringBuilder`].

use bumpalo::Bump;
use dy_core::arena::with_arena;
use dy_core::{Str, StringBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringError {
    pub message: &'static str,
    /// Offset of the offending escape within the string body
    pub offset: usize,
}

impl StringError {
    fn new(message: &'static str, offset: usize) -> Self {
        StringError { message, offset }
    }
}

/// Decode the bytes between the quotes of a JSON string
pub fn decode(body: &[u8]) -> Result<Str, StringError> {
    if !body.contains(&b'\\') {
        return Ok(Str::new(body));
    }
    with_arena(|arena| decode_escaped(arena, body))
}

fn decode_escaped<'b>(arena: &'b Bump, body: &'b [u8]) -> Result<Str, StringError> {
    let mut out = StringBuilder::new();
    let mut run_start = 0;
    let mut i = 0;

    while i < body.len() {
        if body[i] != b'\\' {
            i += 1;
            continue;
        }
        out.append(&body[run_start..i]);

        let Some(&escape) = body.get(i + 1) else {
            return Err(StringError::new("Unterminated escape sequence", i));
        };
        let (piece, used): (&'b [u8], usize) = match escape {
            b'u' => {
                let (c, used) = unicode_escape(body, i)?;
                let mut utf8 = [0u8; 4];
                let encoded = c.encode_utf8(&mut utf8);
                (arena.alloc_slice_copy(encoded.as_bytes()), used)
            }
            other => {
                let simple: &'static [u8] = match other {
                    b'"' => b"\"",
                    b'\\' => b"\\",
                    b'/' => b"/",
                    b'b' => b"\x08",
                    b'f' => b"\x0c",
                    b'n' => b"\n",
                    b'r' => b"\r",
                    b't' => b"\t",
                    _ => return Err(StringError::new("Unknown escape sequence", i)),
                };
                (simple, 2)
            }
        };
        out.append(piece);
        i += used;
        run_start = i;
    }
    out.append(&body[run_start..]);
    Ok(out.build())
}

fn hex4(body: &[u8], at: usize) -> Option<u32> {
    let digits = body.get(at..at + 4)?;
    digits.iter().try_fold(0u32, |acc, &b| {
        let d = (b as char).to_digit(16)?;
        Some(acc * 16 + d)
    })
}

/// Decode the `\uXXXX` escape at `start`, pairing surrogates.
/// Returns the character and the number of bytes consumed.
fn unicode_escape(body: &[u8], start: usize) -> Result<(char, usize), StringError> {
    let high = hex4(body, start + 2)
        .ok_or_else(|| StringError::new("Invalid unicode escape", start))?;

    match high {
        0xD800..=0xDBFF => {
            let low = match body.get(start + 6..start + 8) {
                Some(b"\\u") => hex4(body, start + 8)
                    .ok_or_else(|| StringError::new("Invalid unicode escape", start + 6))?,
                _ => return Err(StringError::new("Unpaired surrogate in unicode escape", start)),
            };
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(StringError::new("Unpaired surrogate in unicode escape", start));
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            char::from_u32(code)
                .map(|c| (c, 12))
                .ok_or_else(|| StringError::new("Invalid unicode escape", start))
        }
        0xDC00..=0xDFFF => Err(StringError::new("Unpaired surrogate in unicode escape", start)),
        _ => char::from_u32(high)
            .map(|c| (c, 6))
            .ok_or_else(|| StringError::new("Invalid unicode escape", start)),
    }
}
