//! SIMD acceleration for the hot kernels of the compressor.
//!
//! This module provides SIMD-accelerated implementations of:
//! - Adler-32 checksum
//! - CRC-32 checksum (PCLMULQDQ folding on x86_64, CRC32 instructions on aarch64)
//! - LZ77 match length comparison
//!
//! The vectorized paths are compiled only with the `simd` feature and fall
//! back to the scalar implementations in [`fallback`] when the CPU lacks the
//! needed extensions. Feature detection runs once and is cached.

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
use std::sync::LazyLock;

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
pub mod x86_64;

#[cfg(all(feature = "simd", target_arch = "aarch64"))]
pub mod aarch64;

pub mod fallback;

/// Inputs shorter than this take the scalar checksum paths.
pub const MIN_SIMD_LEN: usize = 64;

// ============================================================================
// Cached SIMD Feature Detection
// ============================================================================

/// SIMD capability level for x86_64, detected once at startup.
#[cfg(all(feature = "simd", target_arch = "x86_64"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum X86SimdLevel {
    /// AVX2 available (best performance).
    Avx2,
    /// SSSE3 available.
    Ssse3,
    /// SSE2 only (baseline for x86_64).
    Sse2,
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
fn detect_x86_simd_level() -> X86SimdLevel {
    let level = if is_x86_feature_detected!("avx2") {
        X86SimdLevel::Avx2
    } else if is_x86_feature_detected!("ssse3") {
        X86SimdLevel::Ssse3
    } else {
        X86SimdLevel::Sse2
    };
    log::debug!("x86_64 simd level: {level:?}");
    level
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
static X86_SIMD_LEVEL: LazyLock<X86SimdLevel> = LazyLock::new(detect_x86_simd_level);

/// PCLMULQDQ plus SSE4.1 (for the final lane extract) enable CRC folding.
#[cfg(all(feature = "simd", target_arch = "x86_64"))]
static HAS_PCLMULQDQ: LazyLock<bool> = LazyLock::new(|| {
    let available = is_x86_feature_detected!("pclmulqdq") && is_x86_feature_detected!("sse4.1");
    log::debug!("pclmulqdq crc32: {available}");
    available
});

#[cfg(all(feature = "simd", target_arch = "aarch64"))]
static HAS_ARM_CRC: std::sync::LazyLock<bool> =
    std::sync::LazyLock::new(|| std::arch::is_aarch64_feature_detected!("crc"));

// ============================================================================
// Public API Functions
// ============================================================================

/// Continue an Adler-32 checksum using the best available implementation.
#[inline]
pub fn adler32(adler: u32, data: &[u8]) -> u32 {
    if data.len() < MIN_SIMD_LEN {
        return fallback::adler32(adler, data);
    }

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        match *X86_SIMD_LEVEL {
            X86SimdLevel::Avx2 => unsafe { x86_64::adler32_avx2(adler, data) },
            X86SimdLevel::Ssse3 => unsafe { x86_64::adler32_ssse3(adler, data) },
            X86SimdLevel::Sse2 => fallback::adler32(adler, data),
        }
    }

    #[cfg(all(feature = "simd", target_arch = "aarch64"))]
    {
        // NEON is always available on aarch64
        unsafe { aarch64::adler32_neon(adler, data) }
    }

    #[cfg(not(all(feature = "simd", any(target_arch = "x86_64", target_arch = "aarch64"))))]
    fallback::adler32(adler, data)
}

/// Continue a CRC-32 using the best available implementation.
#[inline]
pub fn crc32(crc: u32, data: &[u8]) -> u32 {
    if data.len() < MIN_SIMD_LEN {
        return fallback::crc32(crc, data);
    }

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if *HAS_PCLMULQDQ {
            return unsafe { x86_64::crc32_pclmulqdq(crc, data) };
        }
        fallback::crc32(crc, data)
    }

    #[cfg(all(feature = "simd", target_arch = "aarch64"))]
    {
        if *HAS_ARM_CRC {
            return unsafe { aarch64::crc32_arm(crc, data) };
        }
        fallback::crc32(crc, data)
    }

    #[cfg(not(all(feature = "simd", any(target_arch = "x86_64", target_arch = "aarch64"))))]
    fallback::crc32(crc, data)
}

/// Count equal leading bytes of `data[pos1..]` and `data[pos2..]`, up to `max_len`.
///
/// Panics if either range extends past `data`.
#[inline]
pub fn match_length(data: &[u8], pos1: usize, pos2: usize, max_len: usize) -> usize {
    assert!(pos1.max(pos2) + max_len <= data.len());

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        match *X86_SIMD_LEVEL {
            X86SimdLevel::Avx2 => unsafe { x86_64::match_length_avx2(data, pos1, pos2, max_len) },
            X86SimdLevel::Ssse3 | X86SimdLevel::Sse2 => unsafe {
                x86_64::match_length_sse2(data, pos1, pos2, max_len)
            },
        }
    }

    #[cfg(all(feature = "simd", target_arch = "aarch64"))]
    {
        unsafe { aarch64::match_length_neon(data, pos1, pos2, max_len) }
    }

    #[cfg(not(all(feature = "simd", any(target_arch = "x86_64", target_arch = "aarch64"))))]
    fallback::match_length(data, pos1, pos2, max_len)
}
