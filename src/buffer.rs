/*!
 * Receive Buffer
 *
 * Accumulates reply bytes read from the transport, plus the cursor marking
 * where the next unconsumed byte starts. The decoder only ever moves the
 * cursor; the bytes behind it stay in place until `compact` drops them.
 */

use bytes::{Buf, BytesMut};

/// Initial capacity of the receive buffer
const READ_BUF: usize = 4096;

/// Growing byte buffer with a read cursor
///
/// Invariant: `cursor <= data.len()`. Bytes before the cursor are consumed.
#[derive(Debug)]
pub struct ReceiveBuffer {
    data: BytesMut,
    cursor: usize,
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(READ_BUF),
            cursor: 0,
        }
    }

    /// All buffered bytes, consumed prefix included
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Total buffered length, consumed prefix included
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor; positions past the end are clamped to the end
    #[inline]
    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = pos.min(self.data.len());
    }

    /// Unconsumed bytes starting at the cursor
    #[inline]
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Split into the byte slice and a mutable cursor, for the decoder
    #[inline]
    pub fn parts_mut(&mut self) -> (&[u8], &mut usize) {
        (&self.data[..], &mut self.cursor)
    }

    /// Mutable access for transports appending newly read bytes
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Drop the consumed prefix and reset the cursor to 0
    ///
    /// Must not be called while a decode attempt is in progress.
    pub fn compact(&mut self) {
        if self.cursor > 0 {
            self.data.advance(self.cursor);
            self.cursor = 0;
        }
    }

    /// Discard everything
    pub fn clear(&mut self) {
        self.data.clear();
        self.cursor = 0;
    }
}
