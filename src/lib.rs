//! # zdeflate
//!
//! A streaming DEFLATE (RFC 1951) compressor with zlib framing (RFC 1950).
//!
//! Built as the write side of an image container's compressed data chunks:
//! raw scanline bytes go in, a zlib stream with its Adler-32 trailer comes
//! out. The CRC-32 used by the chunk writer around it is exposed as well.
//!
//! ## Features
//!
//! - **Hash-chained LZ77** with greedy (levels 1-4) and lazy (levels 5-9) parsing
//! - **Canonical Huffman codes**, length-limited, with stored/static/dynamic
//!   block selection
//! - **Streaming**: input and output buffers of any size, sync flush
//! - Optional SIMD checksums and match comparison via the `simd` feature
//!   (on by default, runtime-detected)
//!
//! ## Example
//!
//! ```rust
//! use std::io::Write;
//! use zdeflate::{DeflateOptions, ZlibEncoder};
//!
//! let rows: Vec<u8> = (0..4096).map(|i| (i % 16) as u8).collect();
//!
//! let mut encoder = ZlibEncoder::new(Vec::new(), DeflateOptions::default()).unwrap();
//! encoder.write_all(&rows).unwrap();
//! let stream = encoder.finish().unwrap();
//! assert!(stream.len() < rows.len());
//!
//! // One-shot helper
//! let same = zdeflate::compress_zlib(&rows, 6).unwrap();
//! assert_eq!(stream, same);
//! ```

#![cfg_attr(not(feature = "simd"), forbid(unsafe_code))]
#![warn(missing_docs)]

pub mod bits;
pub mod compress;
pub mod error;
pub mod simd;

pub use compress::{
    adler32, compress_zlib, crc32, crc32_update, deflate_raw, DeflateOptions, DeflateStrategy,
    Deflater, ZlibEncoder,
};
pub use error::{Error, Result};
