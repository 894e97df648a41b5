//! Compression algorithms.
//!
//! [`zlib::ZlibEncoder`] frames the output of [`deflate::Deflater`], which
//! drives the [`lz77::MatchEngine`] and its [`huffman::HuffmanCoder`].
//! [`adler32`] and [`crc32`] are the two checksums the surrounding formats
//! need.

pub mod adler32;
pub mod config;
pub mod crc32;
pub mod deflate;
pub mod huffman;
pub mod lz77;
pub mod zlib;

pub use adler32::{adler32, adler32_update, Adler32};
pub use config::{CompressionFunction, DeflateOptions, DeflateStrategy};
pub use crc32::{crc32, crc32_update, Crc32};
pub use deflate::{deflate_raw, Deflater, DeflaterState};
pub use zlib::{compress_zlib, zlib_header, ZlibEncoder};
