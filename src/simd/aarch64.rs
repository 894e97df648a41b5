//! ARM64 implementations using NEON and the ARMv8 CRC32 extension.

use std::arch::aarch64::*;

use super::fallback::{self, MOD_ADLER, NMAX};

/// Continue an Adler-32 checksum using NEON, 16 bytes per step.
///
/// # Safety
/// Caller must ensure NEON is available (always true on aarch64).
#[target_feature(enable = "neon")]
pub unsafe fn adler32_neon(adler: u32, data: &[u8]) -> u32 {
    const BLOCK_SIZE: usize = NMAX / 16 * 16;

    let mut s1 = adler & 0xFFFF;
    let mut s2 = adler >> 16;

    let mut remaining = data;

    while remaining.len() >= 16 {
        let take = remaining.len().min(BLOCK_SIZE) / 16 * 16;
        let (block, rest) = remaining.split_at(take);
        let (new_s1, new_s2) = adler32_block_neon(block, s1, s2);
        s1 = new_s1 % MOD_ADLER;
        s2 = new_s2 % MOD_ADLER;
        remaining = rest;
    }

    fallback::adler32((s2 << 16) | s1, remaining)
}

/// Accumulate whole 16-byte chunks of `data` into unreduced `s1`/`s2`.
///
/// For a chunk at position p:
/// - s1 contribution = sum(b[i]) for i in 0..16
/// - s2 contribution = 16*s1_before + 16*b[0] + 15*b[1] + ... + 1*b[15]
#[target_feature(enable = "neon")]
unsafe fn adler32_block_neon(data: &[u8], mut s1: u32, mut s2: u32) -> (u32, u32) {
    let weights: [u8; 16] = [16, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1];
    let weights_vec = vld1q_u8(weights.as_ptr());
    let w_lo = vget_low_u8(weights_vec);
    let w_hi = vget_high_u8(weights_vec);

    for chunk in data.chunks_exact(16) {
        let v = vld1q_u8(chunk.as_ptr());

        s2 = s2.wrapping_add(s1.wrapping_mul(16));

        // u8x16 -> u16x8 -> u32x4, then across lanes
        let sum_16 = vpaddlq_u8(v);
        let chunk_sum = vaddvq_u32(vpaddlq_u16(sum_16));

        let prod_lo = vmull_u8(vget_low_u8(v), w_lo);
        let prod_hi = vmull_u8(vget_high_u8(v), w_hi);
        let weighted_sum = vaddvq_u32(vpaddlq_u16(vaddq_u16(prod_lo, prod_hi)));

        s2 = s2.wrapping_add(weighted_sum);
        s1 = s1.wrapping_add(chunk_sum);
    }

    (s1, s2)
}

/// Continue a CRC-32 using the ARMv8 `crc32` instructions.
///
/// # Safety
/// Caller must ensure the `crc` target feature is available.
#[target_feature(enable = "crc")]
pub unsafe fn crc32_arm(crc: u32, data: &[u8]) -> u32 {
    let mut c = !crc;
    let mut words = data.chunks_exact(8);
    for word in &mut words {
        c = __crc32d(c, fallback::read_u64(word, 0).to_le());
    }
    for &byte in words.remainder() {
        c = __crc32b(c, byte);
    }
    !c
}

/// Compute match length using NEON 16-byte comparison.
///
/// # Safety
/// Caller must ensure NEON is available. Both `pos1 + max_len` and
/// `pos2 + max_len` must be within `data`.
#[target_feature(enable = "neon")]
pub unsafe fn match_length_neon(data: &[u8], pos1: usize, pos2: usize, max_len: usize) -> usize {
    debug_assert!(pos1 + max_len <= data.len() && pos2 + max_len <= data.len());
    let mut length = 0;

    while length + 16 <= max_len {
        let a = vld1q_u8(data[pos1 + length..].as_ptr());
        let b = vld1q_u8(data[pos2 + length..].as_ptr());

        // 0xFF where equal
        let cmp = vceqq_u8(a, b);

        if vminvq_u8(cmp) != 0xFF {
            // Narrow each byte to a nibble; the first zero nibble is the mismatch.
            let nibbles = vshrn_n_u16(vreinterpretq_u16_u8(cmp), 4);
            let mask = vget_lane_u64(vreinterpret_u64_u8(nibbles), 0);
            return length + ((!mask).trailing_zeros() / 4) as usize;
        }
        length += 16;
    }

    length + fallback::match_length(data, pos1 + length, pos2 + length, max_len - length)
}
