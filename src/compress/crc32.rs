//! CRC-32 checksum (CRC-32/ISO-HDLC), exposed for chunk-integrity writers.
//!
//! The zlib trailer uses Adler-32; this checksum is computed separately by
//! whatever frames the compressed payload (for example a PNG chunk writer).

/// Calculate the CRC-32 of `data`.
///
/// Uses the CRC-32/ISO-HDLC algorithm (polynomial 0x04C11DB7 reflected).
/// This is the CRC used by PNG, gzip, and many other formats.
#[inline]
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

/// Continue a CRC-32 from `crc` over `data`.
///
/// Both `crc` and the result use the ones-complement convention, so the
/// output of one call is the seed for the next.
#[inline]
#[must_use]
pub fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    crate::simd::crc32(crc, data)
}

/// Calculate CRC32 incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    crc: u32,
}

impl Crc32 {
    /// Create a new CRC32 calculator.
    pub fn new() -> Self {
        Self { crc: 0 }
    }

    /// Resume from a previously finalized value.
    pub fn with_seed(seed: u32) -> Self {
        Self { crc: seed }
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.crc = crc32_update(self.crc, data);
    }

    /// Current CRC value.
    #[inline]
    pub fn finalize(&self) -> u32 {
        self.crc
    }

    /// Start over with the initial value.
    pub fn reset(&mut self) {
        self.crc = 0;
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
