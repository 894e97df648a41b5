//! Bit-level output buffering for DEFLATE.
//!
//! [`PendingBuffer`] packs Huffman codes LSB-first into a byte vector and
//! hands completed bytes out in caller-sized pieces, so the deflater can
//! produce output into arbitrarily small windows.

use crate::compress::config::PENDING_BUF_SIZE;

/// Pending output of the deflater: whole bytes plus a sub-byte accumulator.
///
/// Bytes between `start` and the end of `buffer` have been produced but not
/// yet handed to the caller. `bits` holds up to 15 bits that have not
/// reached a byte boundary.
#[derive(Debug)]
pub struct PendingBuffer {
    buffer: Vec<u8>,
    start: usize,
    bits: u32,
    bit_count: u32,
}

impl PendingBuffer {
    /// Create a pending buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(PENDING_BUF_SIZE)
    }

    /// Create a pending buffer with the specified byte capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            start: 0,
            bits: 0,
            bit_count: 0,
        }
    }

    /// Discard all pending bytes and bits. Capacity is kept.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.start = 0;
        self.bits = 0;
        self.bit_count = 0;
    }

    /// Free the backing storage.
    pub(crate) fn release(&mut self) {
        self.reset();
        self.buffer = Vec::new();
    }

    /// Write one byte. The stream must already be byte aligned.
    #[inline]
    pub fn write_byte(&mut self, value: u8) {
        debug_assert_eq!(self.bit_count, 0, "write_byte on unaligned stream");
        self.buffer.push(value);
    }

    /// Write a 16-bit value, least significant byte first.
    #[inline]
    pub fn write_short(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a 16-bit value, most significant byte first.
    #[inline]
    pub fn write_short_msb(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Copy raw bytes. The stream must already be byte aligned.
    #[inline]
    pub fn write_block(&mut self, block: &[u8]) {
        debug_assert_eq!(self.bit_count, 0, "write_block on unaligned stream");
        self.buffer.extend_from_slice(block);
    }

    /// Number of bits waiting in the accumulator.
    #[inline]
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Flush the partial byte (if any) and clear the accumulator.
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            self.buffer.push(self.bits as u8);
            if self.bit_count > 8 {
                self.buffer.push((self.bits >> 8) as u8);
            }
        }
        self.bits = 0;
        self.bit_count = 0;
    }

    /// Write the low `count` bits of `value`, LSB first.
    ///
    /// `value` must not have bits set above `count`.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u32) {
        debug_assert!(count <= 16);
        debug_assert!(value >> count == 0);

        self.bits |= value << self.bit_count;
        self.bit_count += count;
        if self.bit_count >= 16 {
            self.buffer.push(self.bits as u8);
            self.buffer.push((self.bits >> 8) as u8);
            self.bits >>= 16;
            self.bit_count -= 16;
        }
    }

    /// True when no whole bytes are waiting to be flushed.
    #[inline]
    pub fn is_flushed(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Move as many pending bytes as fit into `output`.
    ///
    /// A whole byte sitting in the accumulator is drained first. Returns the
    /// number of bytes written.
    pub fn flush(&mut self, output: &mut [u8]) -> usize {
        if self.bit_count >= 8 {
            self.buffer.push(self.bits as u8);
            self.bits >>= 8;
            self.bit_count -= 8;
        }

        let available = self.buffer.len() - self.start;
        let count = available.min(output.len());
        output[..count].copy_from_slice(&self.buffer[self.start..self.start + count]);

        if count == available {
            self.buffer.clear();
            self.start = 0;
        } else {
            self.start += count;
        }
        count
    }

    /// Take every pending whole byte. Used by tests and one-shot helpers.
    pub fn to_vec(&mut self) -> Vec<u8> {
        let mut out = vec![0u8; self.buffer.len() - self.start + 1];
        let written = self.flush(&mut out);
        out.truncate(written);
        out
    }
}

impl Default for PendingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
