//! Adler-32 checksum (RFC 1950) used for the zlib trailer.

/// Adler-32 value of the empty input.
pub const ADLER32_SEED: u32 = 1;

/// Calculate the Adler-32 checksum of `data`.
#[inline]
#[must_use]
pub fn adler32(data: &[u8]) -> u32 {
    adler32_update(ADLER32_SEED, data)
}

/// Continue an Adler-32 checksum from `adler` over `data`.
///
/// Modulo reductions are deferred to NMAX (5552 byte) boundaries. With the
/// `simd` feature, inputs of 64 bytes or more use the vectorized path.
/// Empty input returns `adler` unchanged.
#[inline]
#[must_use]
pub fn adler32_update(adler: u32, data: &[u8]) -> u32 {
    if data.is_empty() {
        return adler;
    }
    crate::simd::adler32(adler, data)
}

/// Running Adler-32 over a stream of byte slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    value: u32,
}

impl Adler32 {
    /// Start a fresh checksum.
    pub fn new() -> Self {
        Self::with_seed(ADLER32_SEED)
    }

    /// Resume from a previously computed checksum.
    pub fn with_seed(seed: u32) -> Self {
        Self { value: seed }
    }

    /// Fold more bytes into the checksum.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.value = adler32_update(self.value, data);
    }

    /// Current checksum value.
    #[inline]
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Go back to the empty-input value.
    pub fn reset(&mut self) {
        self.value = ADLER32_SEED;
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adler32_empty() {
        assert_eq!(adler32(&[]), 1);
        assert_eq!(adler32_update(0xDEAD_BEEF, &[]), 0xDEAD_BEEF);
    }

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(adler32(b"hello"), 0x062C0215);
        assert_eq!(adler32(b"Adler-32"), 0x0C34027B);
        assert_eq!(adler32(b"123456789"), 0x091E01DE);
    }

    #[test]
    fn test_adler32_large_input() {
        // 0xAB repeated: s1 and s2 have closed forms mod 65521.
        let data = vec![0xAB; 10000];
        let n = data.len() as u64;
        let s1 = (1 + 0xAB * n) % 65521;
        let s2 = (n + 0xAB * n * (n + 1) / 2) % 65521;
        assert_eq!(adler32(&data), ((s2 << 16) | s1) as u32);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data: Vec<u8> = (0..12_345).map(|i| (i * 17 % 256) as u8).collect();
        let mut running = Adler32::new();
        for chunk in data.chunks(1000) {
            running.update(chunk);
        }
        assert_eq!(running.value(), adler32(&data));

        running.reset();
        assert_eq!(running.value(), 1);
    }

    #[test]
    fn test_with_seed_resumes() {
        let (a, b) = b"Adler-32".split_at(3);
        let mut running = Adler32::with_seed(adler32(a));
        running.update(b);
        assert_eq!(running.value(), 0x0C34027B);
    }
}
