//! Streaming DEFLATE compressor (RFC 1951).
//!
//! [`Deflater`] drives the [`MatchEngine`] and moves its pending output into
//! caller-provided buffers. Input and output are decoupled: the caller queues
//! input with [`Deflater::set_input`], then calls [`Deflater::deflate`] until
//! it returns 0, which means either more input is needed or the stream is
//! finished.

use crate::compress::config::{DeflateOptions, DeflateStrategy, DEFAULT_BUFFER_SIZE};
use crate::compress::lz77::MatchEngine;
use crate::error::{Error, Result};

/// Where the deflater is in the stream lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeflaterState {
    /// Accepting input and emitting blocks as they fill.
    Busy,
    /// Closing the current block so everything written so far is decodable.
    Flushing,
    /// Emitting the final block.
    Finishing,
    /// The final block is written; pending output may remain.
    Finished,
    /// Buffers released; every operation fails.
    Closed,
}

/// Incremental raw DEFLATE encoder.
///
/// # Example
///
/// ```rust
/// use zdeflate::compress::deflate::Deflater;
///
/// let data = b"hello hello hello hello";
/// let mut deflater = Deflater::new(6).unwrap();
/// deflater.set_input(data, 0, data.len()).unwrap();
/// deflater.finish().unwrap();
///
/// let mut out = vec![0u8; 64];
/// let n = deflater.deflate(&mut out, 0, 64).unwrap();
/// assert!(deflater.is_finished());
/// assert!(n < data.len());
/// ```
#[derive(Debug)]
pub struct Deflater {
    engine: MatchEngine,
    level: u8,
    state: DeflaterState,
    flush_requested: bool,
    finish_requested: bool,
    total_out: u64,
}

impl Deflater {
    /// Create a deflater at `level` (0-9).
    pub fn new(level: u8) -> Result<Self> {
        let mut engine = MatchEngine::new();
        engine.set_level(level)?;
        Ok(Self {
            engine,
            level,
            state: DeflaterState::Busy,
            flush_requested: false,
            finish_requested: false,
            total_out: 0,
        })
    }

    /// Create a deflater from encoder options.
    pub fn with_options(options: &DeflateOptions) -> Result<Self> {
        options.validate()?;
        let mut deflater = Self::new(options.level)?;
        deflater.engine.set_strategy(options.strategy);
        Ok(deflater)
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.state == DeflaterState::Closed {
            return Err(Error::AlreadyClosed);
        }
        Ok(())
    }

    /// Start a new stream, keeping level and strategy.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = DeflaterState::Busy;
        self.flush_requested = false;
        self.finish_requested = false;
        self.total_out = 0;
        self.engine.reset();
        Ok(())
    }

    /// Release the window, tables and pending buffers.
    ///
    /// Calling it again is a no-op. Every other operation afterwards fails
    /// with [`Error::AlreadyClosed`].
    pub fn close(&mut self) {
        if self.state == DeflaterState::Closed {
            return;
        }
        log::debug!(
            "closing deflater: {} bytes in, {} bytes out",
            self.engine.total_in(),
            self.total_out
        );
        self.engine.release();
        self.state = DeflaterState::Closed;
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> DeflaterState {
        self.state
    }

    /// Queue `buffer[offset..offset + count]` for compression.
    ///
    /// Only valid when [`needs_input`](Self::needs_input) is true.
    pub fn set_input(&mut self, buffer: &[u8], offset: usize, count: usize) -> Result<()> {
        self.ensure_open()?;
        if self.finish_requested
            || matches!(
                self.state,
                DeflaterState::Finishing | DeflaterState::Finished
            )
        {
            return Err(Error::AlreadyFinished);
        }
        let end = offset
            .checked_add(count)
            .filter(|&end| end <= buffer.len())
            .ok_or(Error::InvalidArgument("input range out of bounds"))?;

        self.engine.set_input(&buffer[offset..end])
    }

    /// True when all queued input has been taken in.
    #[inline]
    pub fn needs_input(&self) -> bool {
        self.engine.needs_input()
    }

    /// Close the current block on the next [`deflate`](Self::deflate) so
    /// that all input so far can be decoded from the output.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_requested = true;
        Ok(())
    }

    /// End the stream after the queued input. No input is accepted after
    /// this.
    pub fn finish(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.finish_requested = true;
        Ok(())
    }

    /// True once the final block is written and fully drained.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == DeflaterState::Finished && self.engine.huffman.pending().is_flushed()
    }

    /// Change the compression level (0-9) mid-stream.
    pub fn set_level(&mut self, level: u8) -> Result<()> {
        self.ensure_open()?;
        if level != self.level {
            self.engine.set_level(level)?;
            self.level = level;
        }
        Ok(())
    }

    /// Current compression level.
    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Change the match-selection strategy mid-stream.
    pub fn set_strategy(&mut self, strategy: DeflateStrategy) -> Result<()> {
        self.ensure_open()?;
        self.engine.set_strategy(strategy);
        Ok(())
    }

    /// Current strategy.
    #[inline]
    pub fn strategy(&self) -> DeflateStrategy {
        self.engine.strategy()
    }

    /// Uncompressed bytes taken in so far.
    #[inline]
    pub fn total_in(&self) -> u64 {
        self.engine.total_in()
    }

    /// Compressed bytes handed out so far.
    #[inline]
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Turn pending flush/finish requests into a state change.
    fn apply_requests(&mut self) {
        self.state = match self.state {
            DeflaterState::Busy | DeflaterState::Flushing if self.finish_requested => {
                DeflaterState::Finishing
            }
            DeflaterState::Busy if self.flush_requested => DeflaterState::Flushing,
            state => state,
        };
        self.flush_requested = false;
    }

    /// Compress into `output[offset..offset + length]`.
    ///
    /// Returns the number of bytes written. 0 means the deflater needs more
    /// input or has finished; check [`needs_input`](Self::needs_input) and
    /// [`is_finished`](Self::is_finished).
    pub fn deflate(&mut self, output: &mut [u8], offset: usize, length: usize) -> Result<usize> {
        self.ensure_open()?;
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= output.len())
            .ok_or(Error::InvalidArgument("output range out of bounds"))?;

        self.apply_requests();

        let mut pos = offset;
        loop {
            let count = self.engine.huffman.pending_mut().flush(&mut output[pos..end]);
            pos += count;
            self.total_out += count as u64;

            if pos == end || self.state == DeflaterState::Finished {
                break;
            }

            let flush = matches!(
                self.state,
                DeflaterState::Flushing | DeflaterState::Finishing
            );
            let finish = self.state == DeflaterState::Finishing;
            if self.engine.deflate(flush, finish)? {
                continue;
            }

            match self.state {
                DeflaterState::Busy => break,
                DeflaterState::Flushing => {
                    if self.level != 0 {
                        // Empty static blocks (10 bits each) push the last
                        // real block's bits out of the accumulator.
                        let pending = self.engine.huffman.pending_mut();
                        let mut needed_bits = 8 + (pending.bit_count().wrapping_neg() & 7) as i32;
                        while needed_bits > 0 {
                            pending.write_bits(2, 10);
                            needed_bits -= 10;
                        }
                    }
                    self.state = DeflaterState::Busy;
                }
                DeflaterState::Finishing => {
                    self.engine.huffman.pending_mut().align_to_byte();
                    self.state = DeflaterState::Finished;
                    log::debug!(
                        "deflate finished: {} bytes in, level {}",
                        self.engine.total_in(),
                        self.level
                    );
                }
                DeflaterState::Finished | DeflaterState::Closed => break,
            }
        }

        Ok(pos - offset)
    }
}

/// Compress `data` into a raw DEFLATE stream (no zlib framing).
pub fn deflate_raw(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut deflater = Deflater::new(level)?;
    deflater.set_input(data, 0, data.len())?;
    deflater.finish()?;

    let mut out = Vec::with_capacity(data.len() / 2 + 64);
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
    while !deflater.is_finished() {
        let written = deflater.deflate(&mut buf, 0, DEFAULT_BUFFER_SIZE)?;
        if written == 0 && !deflater.is_finished() {
            return Err(Error::IncompleteFlush);
        }
        out.extend_from_slice(&buf[..written]);
    }
    Ok(out)
}
