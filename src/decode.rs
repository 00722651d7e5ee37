/*!
 * Incremental RESP Reply Decoder
 *
 * Decodes one reply at a time from a byte slice and a cursor into it. Every
 * entry point returns `Result<Option<T>, ProtocolError>`:
 *
 * * `Ok(Some(v))` - a complete value was read, the cursor is past it
 * * `Ok(None)`    - not enough bytes yet, the cursor is exactly where it was
 * * `Err(e)`      - the stream is malformed, retrying cannot help
 *
 * Because an incomplete attempt never moves the cursor, the caller can append
 * more bytes and simply call again from the same position.
 */

use crate::config::DriverConfig;
use crate::error::ProtocolError;
use crate::protocol::{Reply, ARRAY, BULK, ERROR, INTEGER, STATUS};
use bytes::Bytes;

/// Upper bound on array preallocation; larger counts grow as elements arrive
const MAX_PREALLOC: usize = 1024;

/// Reply decoder holding the limits it enforces
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    max_depth: usize,
    strict_integers: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::from_config(&DriverConfig::default())
    }
}

impl Decoder {
    pub fn new(max_depth: usize, strict_integers: bool) -> Self {
        Self {
            max_depth,
            strict_integers,
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new(config.max_depth, config.strict_integers)
    }

    /// Decode exactly one top-level reply starting at `*cursor`
    ///
    /// An empty remainder is incomplete, not an error.
    pub fn decode_one(&self, buf: &[u8], cursor: &mut usize) -> Result<Option<Reply>, ProtocolError> {
        let start = *cursor;
        let Some(&marker) = buf.get(start) else {
            return Ok(None);
        };

        let reply = match marker {
            ERROR | STATUS => {
                *cursor += 1;
                match get_line(buf, cursor) {
                    Some(line) => {
                        let text = String::from_utf8_lossy(line).into_owned();
                        if marker == ERROR {
                            Some(Reply::Error(text))
                        } else {
                            Some(Reply::Status(text))
                        }
                    }
                    None => None,
                }
            }
            INTEGER => {
                *cursor += 1;
                self.parse_integer(buf, cursor)?.map(Reply::Integer)
            }
            BULK => self.parse_bulk_string(buf, cursor)?.map(Reply::Bulk),
            ARRAY => self.parse_array_at(buf, cursor, 1)?,
            other => return Err(ProtocolError::InvalidTypeMarker(other)),
        };

        if reply.is_none() {
            *cursor = start;
        }
        Ok(reply)
    }

    /// Parse a signed decimal terminated by CRLF
    ///
    /// In lenient mode digits stop at the first non-digit byte and whatever was
    /// read up to there is the value; the cursor always lands just past the
    /// CRLF. Strict mode rejects anything but `-?[0-9]+` before the CRLF.
    pub fn parse_integer(&self, buf: &[u8], cursor: &mut usize) -> Result<Option<i64>, ProtocolError> {
        let start = *cursor;
        let Some(line) = get_line(buf, cursor) else {
            return Ok(None);
        };

        if self.strict_integers {
            return match parse_strict(line) {
                Some(n) => Ok(Some(n)),
                None => {
                    *cursor = start;
                    Err(ProtocolError::InvalidInteger(
                        String::from_utf8_lossy(line).into_owned(),
                    ))
                }
            };
        }

        Ok(Some(parse_lenient(line)))
    }

    /// Parse `$<len>\r\n<payload>\r\n`, or `$-1\r\n` as null
    ///
    /// The byte at `*cursor` must be the bulk marker.
    pub fn parse_bulk_string(
        &self,
        buf: &[u8],
        cursor: &mut usize,
    ) -> Result<Option<Option<Bytes>>, ProtocolError> {
        let start = *cursor;
        debug_assert_eq!(buf.get(start), Some(&BULK));
        *cursor += 1;

        let len = match self.parse_integer(buf, cursor) {
            Ok(Some(len)) => len,
            Ok(None) => {
                *cursor = start;
                return Ok(None);
            }
            Err(e) => {
                *cursor = start;
                return Err(e);
            }
        };

        if len < -1 {
            *cursor = start;
            return Err(ProtocolError::InvalidLength(len));
        }
        if len == -1 {
            return Ok(Some(None));
        }

        let len = len as usize;
        let payload_start = *cursor;
        // Payload plus its trailing CRLF must be fully buffered
        let end = match payload_start.checked_add(len).and_then(|n| n.checked_add(2)) {
            Some(end) if end <= buf.len() => end,
            _ => {
                *cursor = start;
                return Ok(None);
            }
        };

        if self.strict_integers && &buf[end - 2..end] != b"\r\n" {
            *cursor = start;
            return Err(ProtocolError::MissingTerminator);
        }

        *cursor = end;
        Ok(Some(Some(Bytes::copy_from_slice(
            &buf[payload_start..payload_start + len],
        ))))
    }

    /// Parse `*<count>\r\n` followed by `count` elements, atomically
    ///
    /// The byte at `*cursor` must be the array marker. Elements may only be
    /// bulk strings, integers or nested arrays. If any element is incomplete
    /// the whole array is, and the cursor returns to the marker.
    pub fn parse_array(&self, buf: &[u8], cursor: &mut usize) -> Result<Option<Reply>, ProtocolError> {
        self.parse_array_at(buf, cursor, 1)
    }

    fn parse_array_at(
        &self,
        buf: &[u8],
        cursor: &mut usize,
        depth: usize,
    ) -> Result<Option<Reply>, ProtocolError> {
        let start = *cursor;
        let result = self.parse_array_inner(buf, cursor, depth);
        if !matches!(result, Ok(Some(_))) {
            *cursor = start;
        }
        result
    }

    fn parse_array_inner(
        &self,
        buf: &[u8],
        cursor: &mut usize,
        depth: usize,
    ) -> Result<Option<Reply>, ProtocolError> {
        debug_assert_eq!(buf.get(*cursor), Some(&ARRAY));
        if depth > self.max_depth {
            return Err(ProtocolError::NestingTooDeep(self.max_depth));
        }
        *cursor += 1;

        let Some(count) = self.parse_integer(buf, cursor)? else {
            return Ok(None);
        };
        if count < -1 {
            return Err(ProtocolError::InvalidLength(count));
        }
        if count == -1 {
            // Null array, folded into the single null reply
            return Ok(Some(Reply::Bulk(None)));
        }

        let count = count as usize;
        let mut items = Vec::with_capacity(count.min(MAX_PREALLOC));
        while items.len() < count {
            let Some(&marker) = buf.get(*cursor) else {
                return Ok(None);
            };
            let item = match marker {
                BULK => self.parse_bulk_string(buf, cursor)?.map(Reply::Bulk),
                INTEGER => {
                    *cursor += 1;
                    self.parse_integer(buf, cursor)?.map(Reply::Integer)
                }
                ARRAY => self.parse_array_at(buf, cursor, depth + 1)?,
                other => return Err(ProtocolError::UnexpectedElement(other)),
            };
            match item {
                Some(item) => items.push(item),
                None => return Ok(None),
            }
        }

        Ok(Some(Reply::Array(items)))
    }
}

/// Read one CRLF-terminated line starting at `*cursor`
///
/// # Returns
/// * `Some(line)` without the CRLF, cursor moved past the CRLF
/// * `None` if no CRLF is buffered yet, cursor untouched
pub fn get_line<'a>(buf: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    let start = *cursor;
    let rest = buf.get(start..)?;
    let idx = find_crlf(rest)?;
    *cursor = start + idx + 2;
    Some(&rest[..idx])
}

#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Optional `-`, then digits until the first non-digit
fn parse_lenient(line: &[u8]) -> i64 {
    let (sign, digits) = match line.split_first() {
        Some((b'-', rest)) => (-1, rest),
        _ => (1, line),
    };

    let mut num: i64 = 0;
    for &c in digits {
        if !c.is_ascii_digit() {
            break;
        }
        num = num.wrapping_mul(10).wrapping_add((c - b'0') as i64);
    }
    num.wrapping_mul(sign)
}

/// Exactly `-?[0-9]+`, no overflow
fn parse_strict(line: &[u8]) -> Option<i64> {
    let (negative, digits) = match line.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, line),
    };
    if digits.is_empty() {
        return None;
    }

    let mut num: i64 = 0;
    for &c in digits {
        if !c.is_ascii_digit() {
            return None;
        }
        let d = (c - b'0') as i64;
        // Accumulate negatively so i64::MIN is representable
        num = num.checked_mul(10)?.checked_sub(d)?;
    }
    if negative {
        Some(num)
    } else {
        num.checked_neg()
    }
}
