//! Compression parameters: format constants, per-level tuning, and options.

use crate::error::{Error, Result};

/// Longest match DEFLATE can express.
pub const MAX_MATCH: usize = 258;
/// Shortest match worth emitting.
pub const MIN_MATCH: usize = 3;

/// log2 of the LZ77 window size.
pub const MAX_WBITS: u32 = 15;
/// LZ77 window size (32 KiB). The sliding buffer holds two of these.
pub const WSIZE: usize = 1 << MAX_WBITS;
/// Mask for indexing the `prev` chain table.
pub const WMASK: usize = WSIZE - 1;

const DEFAULT_MEM_LEVEL: u32 = 8;

/// Width of the rolling 3-byte hash.
pub const HASH_BITS: u32 = DEFAULT_MEM_LEVEL + 7;
/// Entries in the `head` table.
pub const HASH_SIZE: usize = 1 << HASH_BITS;
/// Mask applied to every hash value.
pub const HASH_MASK: usize = HASH_SIZE - 1;
/// Shift per byte so that a hash covers exactly `MIN_MATCH` bytes.
pub const HASH_SHIFT: u32 = (HASH_BITS + MIN_MATCH as u32 - 1) / MIN_MATCH as u32;

/// Lookahead that guarantees a full-length match can be examined.
pub const MIN_LOOKAHEAD: usize = MAX_MATCH + MIN_MATCH + 1;
/// Farthest match distance that keeps the lookahead inside the window.
pub const MAX_DIST: usize = WSIZE - MIN_LOOKAHEAD;

/// Initial capacity of the pending output buffer.
pub const PENDING_BUF_SIZE: usize = 1 << (DEFAULT_MEM_LEVEL + 8);
/// Largest stored block payload.
pub const MAX_BLOCK_SIZE: usize = 65535;

/// Number of tokens tallied before a block is forced out.
pub const TALLY_BUF_SIZE: usize = 1 << (DEFAULT_MEM_LEVEL + 6);

/// Length-3 matches farther than this are not worth their distance code.
pub const TOO_FAR: usize = 4096;

/// Highest compression level.
pub const MAX_LEVEL: u8 = 9;
/// Level used when none is given.
pub const DEFAULT_LEVEL: u8 = 6;

/// Smallest output staging buffer accepted by the zlib encoder.
pub const MIN_BUFFER_SIZE: usize = 512;
/// Default output staging buffer of the zlib encoder.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

const GOOD_LENGTH: [usize; 10] = [0, 4, 4, 4, 4, 8, 8, 8, 32, 32];
const MAX_LAZY: [usize; 10] = [0, 4, 5, 6, 4, 16, 16, 32, 128, 258];
const NICE_LENGTH: [usize; 10] = [0, 8, 16, 32, 16, 32, 128, 128, 258, 258];
const MAX_CHAIN: [usize; 10] = [0, 4, 8, 32, 16, 32, 128, 256, 1024, 4096];
const COMPR_FUNC: [u8; 10] = [0, 1, 1, 1, 1, 2, 2, 2, 2, 2];

/// How the match engine turns input into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFunction {
    /// Raw copy into stored blocks.
    Stored,
    /// Greedy matching.
    Fast,
    /// Lazy matching with one token of lookahead.
    Slow,
}

impl TryFrom<u8> for CompressionFunction {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Stored),
            1 => Ok(Self::Fast),
            2 => Ok(Self::Slow),
            other => Err(Error::UnknownCompressionFunction(other)),
        }
    }
}

/// Match-selection strategy, orthogonal to the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeflateStrategy {
    /// Normal LZ77 + Huffman.
    #[default]
    Default,
    /// Drop short matches (length 5 or less) in favor of literals. Suits
    /// filtered image rows whose values are small and noisy.
    Filtered,
    /// Never search for matches; entropy-code literals only.
    HuffmanOnly,
}

/// Search parameters for one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelParams {
    /// Matches at least this long cut the chain search to a quarter.
    pub good_length: usize,
    /// Fast strategy: longest match whose interior positions are hashed.
    pub max_lazy: usize,
    /// Stop searching once a match this long is found.
    pub nice_length: usize,
    /// Maximum hash-chain candidates examined.
    pub max_chain: usize,
    /// Token producer for the level.
    pub function: CompressionFunction,
}

impl LevelParams {
    /// Look up the parameters for `level` (0-9).
    pub fn for_level(level: u8) -> Result<Self> {
        if level > MAX_LEVEL {
            return Err(Error::InvalidArgument("compression level must be 0-9"));
        }
        let i = level as usize;
        Ok(Self {
            good_length: GOOD_LENGTH[i],
            max_lazy: MAX_LAZY[i],
            nice_length: NICE_LENGTH[i],
            max_chain: MAX_CHAIN[i],
            function: CompressionFunction::try_from(COMPR_FUNC[i])?,
        })
    }
}

impl Default for LevelParams {
    /// Parameters of [`DEFAULT_LEVEL`].
    fn default() -> Self {
        Self {
            good_length: 8,
            max_lazy: 16,
            nice_length: 128,
            max_chain: 128,
            function: CompressionFunction::Slow,
        }
    }
}

/// Options for [`ZlibEncoder`](crate::compress::zlib::ZlibEncoder) and
/// [`Deflater`](crate::compress::deflate::Deflater).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateOptions {
    /// Compression level (0-9, default 6).
    pub level: u8,
    /// Match-selection strategy.
    pub strategy: DeflateStrategy,
    /// Size of the staging buffer the encoder drains output through.
    pub buffer_size: usize,
}

impl Default for DeflateOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            strategy: DeflateStrategy::Default,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl DeflateOptions {
    /// Speed-focused preset.
    pub fn fast() -> Self {
        Self {
            level: 2,
            ..Self::default()
        }
    }

    /// Balanced preset (same as the default).
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Highest compression preset; slowest.
    pub fn max_compression() -> Self {
        Self {
            level: MAX_LEVEL,
            ..Self::default()
        }
    }

    /// Set the compression level.
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Set the match-selection strategy.
    pub fn with_strategy(mut self, strategy: DeflateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the staging buffer size (512 bytes minimum).
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Check that the level and buffer size are usable.
    pub fn validate(&self) -> Result<()> {
        if self.level > MAX_LEVEL {
            return Err(Error::InvalidArgument("compression level must be 0-9"));
        }
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(Error::InvalidArgument("buffer size must be at least 512"));
        }
        Ok(())
    }
}
