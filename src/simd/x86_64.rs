//! x86_64 SIMD implementations using SSE2, SSSE3, AVX2, and PCLMULQDQ.

use std::arch::x86_64::*;

use super::fallback::{self, MOD_ADLER, NMAX};

/// Continue an Adler-32 checksum using SSSE3, 32 bytes per step.
///
/// `_mm_sad_epu8` sums the bytes of each half-block for `s1`;
/// `_mm_maddubs_epi16` against the taps 32..1 gives the position-weighted
/// sum for `s2`. The running `s1` contribution to `s2` is collected in
/// `v_ps` and multiplied by 32 once per NMAX-sized run.
///
/// # Safety
/// Caller must ensure SSSE3 is available on the current CPU.
#[target_feature(enable = "ssse3")]
pub unsafe fn adler32_ssse3(adler: u32, data: &[u8]) -> u32 {
    const BLOCK_SIZE: usize = 32;

    let mut s1 = adler & 0xFFFF;
    let mut s2 = adler >> 16;

    let tap1 = _mm_setr_epi8(32, 31, 30, 29, 28, 27, 26, 25, 24, 23, 22, 21, 20, 19, 18, 17);
    let tap2 = _mm_setr_epi8(16, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1);
    let zero = _mm_setzero_si128();
    let ones = _mm_set1_epi16(1);

    let mut blocks = data.chunks_exact(BLOCK_SIZE);
    let mut remaining_blocks = data.len() / BLOCK_SIZE;

    while remaining_blocks > 0 {
        let n = remaining_blocks.min(NMAX / BLOCK_SIZE);
        remaining_blocks -= n;

        let mut v_ps = _mm_set_epi32(0, 0, 0, (s1 * n as u32) as i32);
        let mut v_s2 = _mm_set_epi32(0, 0, 0, s2 as i32);
        let mut v_s1 = _mm_setzero_si128();

        for block in blocks.by_ref().take(n) {
            let bytes1 = _mm_loadu_si128(block.as_ptr() as *const __m128i);
            let bytes2 = _mm_loadu_si128(block[16..].as_ptr() as *const __m128i);

            v_ps = _mm_add_epi32(v_ps, v_s1);

            v_s1 = _mm_add_epi32(v_s1, _mm_sad_epu8(bytes1, zero));
            let mad1 = _mm_maddubs_epi16(bytes1, tap1);
            v_s2 = _mm_add_epi32(v_s2, _mm_madd_epi16(mad1, ones));

            v_s1 = _mm_add_epi32(v_s1, _mm_sad_epu8(bytes2, zero));
            let mad2 = _mm_maddubs_epi16(bytes2, tap2);
            v_s2 = _mm_add_epi32(v_s2, _mm_madd_epi16(mad2, ones));
        }

        v_s2 = _mm_add_epi32(v_s2, _mm_slli_epi32(v_ps, 5));

        v_s1 = _mm_add_epi32(v_s1, _mm_shuffle_epi32(v_s1, 0b01_00_11_10));
        s1 += _mm_cvtsi128_si32(v_s1) as u32;

        v_s2 = _mm_add_epi32(v_s2, _mm_shuffle_epi32(v_s2, 0b10_11_00_01));
        v_s2 = _mm_add_epi32(v_s2, _mm_shuffle_epi32(v_s2, 0b01_00_11_10));
        s2 = _mm_cvtsi128_si32(v_s2) as u32;

        s1 %= MOD_ADLER;
        s2 %= MOD_ADLER;
    }

    fallback::adler32((s2 << 16) | s1, blocks.remainder())
}

/// Continue an Adler-32 checksum using AVX2, 32 bytes per step.
///
/// # Safety
/// Caller must ensure AVX2 is available on the current CPU.
#[target_feature(enable = "avx2")]
pub unsafe fn adler32_avx2(adler: u32, data: &[u8]) -> u32 {
    const BLOCK_SIZE: usize = 32;

    let mut s1 = adler & 0xFFFF;
    let mut s2 = adler >> 16;

    let zeros = _mm256_setzero_si256();
    let ones = _mm256_set1_epi16(1);
    // weights 32..1
    let weights = _mm256_setr_epi8(
        32, 31, 30, 29, 28, 27, 26, 25, 24, 23, 22, 21, 20, 19, 18, 17, 16, 15, 14, 13, 12, 11, 10,
        9, 8, 7, 6, 5, 4, 3, 2, 1,
    );

    let mut blocks = data.chunks_exact(BLOCK_SIZE);
    let mut remaining_blocks = data.len() / BLOCK_SIZE;

    while remaining_blocks > 0 {
        let n = remaining_blocks.min(NMAX / BLOCK_SIZE);
        remaining_blocks -= n;

        let mut v_ps = _mm256_setzero_si256();
        let mut v_s1 = _mm256_setzero_si256();
        let mut v_s2 = _mm256_setzero_si256();

        for block in blocks.by_ref().take(n) {
            let bytes = _mm256_loadu_si256(block.as_ptr() as *const __m256i);
            v_ps = _mm256_add_epi32(v_ps, v_s1);
            v_s1 = _mm256_add_epi32(v_s1, _mm256_sad_epu8(bytes, zeros));
            let mad = _mm256_maddubs_epi16(bytes, weights);
            v_s2 = _mm256_add_epi32(v_s2, _mm256_madd_epi16(mad, ones));
        }

        let ps = hsum_epi32_avx2(v_ps);
        let sum1 = hsum_epi32_avx2(v_s1);
        let sum2 = hsum_epi32_avx2(v_s2);

        s2 += s1 * (n * BLOCK_SIZE) as u32 + (ps << 5) + sum2;
        s1 += sum1;

        s1 %= MOD_ADLER;
        s2 %= MOD_ADLER;
    }

    fallback::adler32((s2 << 16) | s1, blocks.remainder())
}

#[target_feature(enable = "avx2")]
unsafe fn hsum_epi32_avx2(v: __m256i) -> u32 {
    let lo = _mm256_castsi256_si128(v);
    let hi = _mm256_extracti128_si256(v, 1);
    let sum = _mm_add_epi32(lo, hi);
    let sum = _mm_add_epi32(sum, _mm_shuffle_epi32(sum, 0b01_00_11_10));
    let sum = _mm_add_epi32(sum, _mm_shuffle_epi32(sum, 0b10_11_00_01));
    _mm_cvtsi128_si32(sum) as u32
}

/// Continue a CRC-32 using carry-less multiplication.
///
/// Folds four 128-bit lanes across 64-byte blocks, folds the lanes into one,
/// folds any remaining 16-byte blocks, then reduces to 32 bits with a
/// Barrett reduction. The tail that is not a multiple of 16 bytes goes
/// through the table path.
///
/// # Safety
/// Caller must ensure PCLMULQDQ and SSE4.1 are available on the current CPU.
#[target_feature(enable = "pclmulqdq,sse2,sse4.1")]
pub unsafe fn crc32_pclmulqdq(crc: u32, data: &[u8]) -> u32 {
    if data.len() < 64 {
        return fallback::crc32(crc, data);
    }
    let folded_len = data.len() & !15;
    let (head, tail) = data.split_at(folded_len);
    let state = crc32_fold(!crc, head);
    fallback::crc32(!state, tail)
}

/// Fold `data` (at least 64 bytes, a multiple of 16) into the raw CRC state.
#[target_feature(enable = "pclmulqdq,sse2,sse4.1")]
unsafe fn crc32_fold(state: u32, data: &[u8]) -> u32 {
    debug_assert!(data.len() >= 64 && data.len() % 16 == 0);

    let k1k2 = _mm_set_epi64x(0x01_c6e4_1596, 0x01_5444_2bd4);
    let k3k4 = _mm_set_epi64x(0x00_ccaa_009e, 0x01_7519_97d0);
    let k5k0 = _mm_set_epi64x(0, 0x01_63cd_6124);
    let poly = _mm_set_epi64x(0x01_f701_1641, 0x01_db71_0641);

    let load = |offset: usize| _mm_loadu_si128(data[offset..offset + 16].as_ptr() as *const __m128i);

    let mut x1 = load(0);
    let mut x2 = load(16);
    let mut x3 = load(32);
    let mut x4 = load(48);

    x1 = _mm_xor_si128(x1, _mm_cvtsi32_si128(state as i32));

    let mut offset = 64;

    // Parallel fold of 64-byte blocks.
    while data.len() - offset >= 64 {
        x1 = fold_16(x1, k1k2, load(offset));
        x2 = fold_16(x2, k1k2, load(offset + 16));
        x3 = fold_16(x3, k1k2, load(offset + 32));
        x4 = fold_16(x4, k1k2, load(offset + 48));
        offset += 64;
    }

    // Fold the four lanes into one.
    x1 = fold_16(x1, k3k4, x2);
    x1 = fold_16(x1, k3k4, x3);
    x1 = fold_16(x1, k3k4, x4);

    // Single fold of remaining 16-byte blocks.
    while data.len() - offset >= 16 {
        x1 = fold_16(x1, k3k4, load(offset));
        offset += 16;
    }

    // 128 -> 64 bits.
    let x2 = _mm_clmulepi64_si128(x1, k3k4, 0x10);
    let x3 = _mm_setr_epi32(!0, 0, !0, 0);
    x1 = _mm_srli_si128(x1, 8);
    x1 = _mm_xor_si128(x1, x2);

    let x2 = _mm_srli_si128(x1, 4);
    x1 = _mm_and_si128(x1, x3);
    x1 = _mm_clmulepi64_si128(x1, k5k0, 0x00);
    x1 = _mm_xor_si128(x1, x2);

    // Barrett reduction to 32 bits.
    let x2 = _mm_and_si128(x1, x3);
    let x2 = _mm_clmulepi64_si128(x2, poly, 0x10);
    let x2 = _mm_and_si128(x2, x3);
    let x2 = _mm_clmulepi64_si128(x2, poly, 0x00);
    x1 = _mm_xor_si128(x1, x2);

    _mm_extract_epi32(x1, 1) as u32
}

#[inline]
#[target_feature(enable = "pclmulqdq,sse2")]
unsafe fn fold_16(acc: __m128i, k: __m128i, next: __m128i) -> __m128i {
    let lo = _mm_clmulepi64_si128(acc, k, 0x00);
    let hi = _mm_clmulepi64_si128(acc, k, 0x11);
    _mm_xor_si128(_mm_xor_si128(lo, hi), next)
}

/// Compute match length using SSE2 16-byte comparison.
///
/// # Safety
/// Caller must ensure SSE2 is available on the current CPU. Both
/// `pos1 + max_len` and `pos2 + max_len` must be within `data`.
#[target_feature(enable = "sse2")]
pub unsafe fn match_length_sse2(data: &[u8], pos1: usize, pos2: usize, max_len: usize) -> usize {
    debug_assert!(pos1 + max_len <= data.len() && pos2 + max_len <= data.len());
    let mut length = 0;

    while length + 16 <= max_len {
        let a = _mm_loadu_si128(data[pos1 + length..].as_ptr() as *const __m128i);
        let b = _mm_loadu_si128(data[pos2 + length..].as_ptr() as *const __m128i);
        let cmp = _mm_cmpeq_epi8(a, b);
        let mask = _mm_movemask_epi8(cmp) as u32;

        if mask != 0xFFFF {
            // count trailing ones (matching bytes)
            return length + (!mask).trailing_zeros() as usize;
        }
        length += 16;
    }

    length + fallback::match_length(data, pos1 + length, pos2 + length, max_len - length)
}

/// Compute match length using AVX2 32-byte comparison.
///
/// # Safety
/// Caller must ensure AVX2 is available on the current CPU. Both
/// `pos1 + max_len` and `pos2 + max_len` must be within `data`.
#[target_feature(enable = "avx2")]
pub unsafe fn match_length_avx2(data: &[u8], pos1: usize, pos2: usize, max_len: usize) -> usize {
    debug_assert!(pos1 + max_len <= data.len() && pos2 + max_len <= data.len());
    let mut length = 0;

    while length + 32 <= max_len {
        let a = _mm256_loadu_si256(data[pos1 + length..].as_ptr() as *const __m256i);
        let b = _mm256_loadu_si256(data[pos2 + length..].as_ptr() as *const __m256i);
        let cmp = _mm256_cmpeq_epi8(a, b);
        let mask = _mm256_movemask_epi8(cmp) as u32;

        if mask != 0xFFFF_FFFF {
            return length + (!mask).trailing_zeros() as usize;
        }
        length += 32;
    }

    // At most 31 bytes left.
    if length < max_len {
        length + match_length_sse2(data, pos1 + length, pos2 + length, max_len - length)
    } else {
        length
    }
}
