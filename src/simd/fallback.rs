//! Scalar implementations of the SIMD kernels.
//!
//! These are the reference results the vectorized paths are tested against,
//! and the paths taken for short inputs and on targets without SIMD.

/// Adler-32 modulus: the largest prime below 2^16.
pub const MOD_ADLER: u32 = 65_521;

/// Largest n such that 255n(n+1)/2 + (n+1)(MOD_ADLER-1) fits in u32.
pub const NMAX: usize = 5552;

/// Continue an Adler-32 checksum over `data`.
///
/// `adler` is the value returned by a previous call (1 for a fresh stream).
pub fn adler32(adler: u32, data: &[u8]) -> u32 {
    let mut s1 = adler & 0xFFFF;
    let mut s2 = adler >> 16;

    for chunk in data.chunks(NMAX) {
        let mut blocks = chunk.chunks_exact(16);
        for block in &mut blocks {
            // 16 bytes per step.
            s1 += block[0] as u32;
            s2 += s1;
            s1 += block[1] as u32;
            s2 += s1;
            s1 += block[2] as u32;
            s2 += s1;
            s1 += block[3] as u32;
            s2 += s1;
            s1 += block[4] as u32;
            s2 += s1;
            s1 += block[5] as u32;
            s2 += s1;
            s1 += block[6] as u32;
            s2 += s1;
            s1 += block[7] as u32;
            s2 += s1;
            s1 += block[8] as u32;
            s2 += s1;
            s1 += block[9] as u32;
            s2 += s1;
            s1 += block[10] as u32;
            s2 += s1;
            s1 += block[11] as u32;
            s2 += s1;
            s1 += block[12] as u32;
            s2 += s1;
            s1 += block[13] as u32;
            s2 += s1;
            s1 += block[14] as u32;
            s2 += s1;
            s1 += block[15] as u32;
            s2 += s1;
        }
        for &b in blocks.remainder() {
            s1 += b as u32;
            s2 += s1;
        }
        s1 %= MOD_ADLER;
        s2 %= MOD_ADLER;
    }

    (s2 << 16) | s1
}

/// CRC-32 (ISO-HDLC, reflected 0xEDB88320) lookup table.
const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Continue a CRC-32 over `data`, one byte at a time.
///
/// `crc` is the value returned by a previous call (0 for a fresh stream);
/// it is complemented on entry and on exit.
pub fn crc32(crc: u32, data: &[u8]) -> u32 {
    let mut c = !crc;
    for &byte in data {
        c = CRC_TABLE[((c ^ byte as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    !c
}

/// Count equal leading bytes of `data[pos1..]` and `data[pos2..]`, up to `max_len`.
#[inline]
pub fn match_length(data: &[u8], pos1: usize, pos2: usize, max_len: usize) -> usize {
    let mut length = 0;

    // Compare 8 bytes at a time using u64
    while length + 8 <= max_len {
        let a = read_u64(data, pos1 + length);
        let b = read_u64(data, pos2 + length);
        if a != b {
            let xor = a ^ b;
            #[cfg(target_endian = "little")]
            {
                length += (xor.trailing_zeros() / 8) as usize;
            }
            #[cfg(target_endian = "big")]
            {
                length += (xor.leading_zeros() / 8) as usize;
            }
            return length;
        }
        length += 8;
    }

    while length < max_len && data[pos1 + length] == data[pos2 + length] {
        length += 1;
    }

    length
}

#[inline(always)]
pub(crate) fn read_u64(data: &[u8], pos: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[pos..pos + 8]);
    u64::from_ne_bytes(bytes)
}
