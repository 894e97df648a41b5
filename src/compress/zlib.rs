//! zlib stream framing (RFC 1950) around the streaming deflater.
//!
//! A zlib stream is a 2-byte header, raw DEFLATE blocks, and the big-endian
//! Adler-32 of the uncompressed data.

use std::io::{self, Write};

use crate::bits::PendingBuffer;
use crate::compress::adler32::Adler32;
use crate::compress::config::DeflateOptions;
use crate::compress::deflate::Deflater;
use crate::error::{Error, Result};

/// CMF byte: method 8 (deflate), 32 KiB window.
const ZLIB_CMF: u8 = 0x78;

/// Build the zlib header for `level`.
///
/// FLEVEL is 0 for levels 0-2, 1 for 3-4, 2 for 5-6 and 3 for 7-9; FCHECK
/// makes the header a multiple of 31.
pub fn zlib_header(level: u8) -> [u8; 2] {
    let flevel: u16 = match level {
        0..=2 => 0,
        3..=4 => 1,
        5..=6 => 2,
        _ => 3,
    };
    let mut flg = flevel << 6;
    let check = ((ZLIB_CMF as u16) << 8 | flg) % 31;
    flg += (31 - check) % 31;
    [ZLIB_CMF, flg as u8]
}

/// zlib encoder writing to any [`Write`] sink.
///
/// The header is written when the encoder is created. Call
/// [`finish`](Self::finish) to write the last block and the checksum; if the
/// encoder is dropped without it, the stream is finished on a best-effort
/// basis and errors are only logged.
///
/// # Example
///
/// ```rust
/// use std::io::Write;
/// use zdeflate::compress::config::DeflateOptions;
/// use zdeflate::compress::zlib::ZlibEncoder;
///
/// let mut encoder = ZlibEncoder::new(Vec::new(), DeflateOptions::default()).unwrap();
/// encoder.write_all(b"scanline bytes").unwrap();
/// let stream = encoder.finish().unwrap();
/// assert_eq!(&stream[..2], &[0x78, 0x9C]);
/// ```
#[derive(Debug)]
pub struct ZlibEncoder<W: Write> {
    writer: Option<W>,
    deflater: Deflater,
    adler: Adler32,
    buffer: Vec<u8>,
    finished: bool,
}

impl<W: Write> ZlibEncoder<W> {
    /// Create an encoder and write the zlib header to `writer`.
    pub fn new(mut writer: W, options: DeflateOptions) -> Result<Self> {
        options.validate()?;
        let deflater = Deflater::with_options(&options)?;

        let [cmf, flg] = zlib_header(options.level);
        let mut header = PendingBuffer::with_capacity(2);
        header.write_byte(cmf);
        header.write_byte(flg);
        writer.write_all(&header.to_vec())?;
        log::debug!(
            "zlib stream started: level {}, {:?}, buffer {}",
            options.level,
            options.strategy,
            options.buffer_size
        );

        Ok(Self {
            writer: Some(writer),
            deflater,
            adler: Adler32::new(),
            buffer: vec![0; options.buffer_size],
            finished: false,
        })
    }

    /// Compress `data`, writing whatever output is ready to the sink.
    pub fn write_input(&mut self, data: &[u8]) -> Result<()> {
        self.deflater.set_input(data, 0, data.len())?;
        self.adler.update(data);

        while !self.deflater.needs_input() {
            if self.deflate_chunk()? == 0 {
                break;
            }
        }
        if !self.deflater.needs_input() {
            return Err(Error::IncompleteFlush);
        }
        Ok(())
    }

    /// Sync-flush: make everything written so far decodable from the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.deflater.flush()?;
        while self.deflate_chunk()? > 0 {}
        self.writer_mut()?.flush()?;
        Ok(())
    }

    /// Write the final block and the Adler-32 trailer, then return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.finish_stream()?;
        self.writer.take().ok_or(Error::AlreadyClosed)
    }

    /// Running Adler-32 of the input so far.
    #[inline]
    pub fn checksum(&self) -> u32 {
        self.adler.value()
    }

    /// Uncompressed bytes accepted so far.
    #[inline]
    pub fn total_in(&self) -> u64 {
        self.deflater.total_in()
    }

    /// Compressed DEFLATE bytes produced so far, excluding header and trailer.
    #[inline]
    pub fn total_out(&self) -> u64 {
        self.deflater.total_out()
    }

    /// The underlying sink.
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    fn writer_mut(&mut self) -> Result<&mut W> {
        self.writer.as_mut().ok_or(Error::AlreadyClosed)
    }

    /// Run the deflater once into the staging buffer and pass the output on.
    fn deflate_chunk(&mut self) -> Result<usize> {
        let len = self.buffer.len();
        let written = self.deflater.deflate(&mut self.buffer, 0, len)?;
        if written > 0 {
            let writer = self.writer.as_mut().ok_or(Error::AlreadyClosed)?;
            writer.write_all(&self.buffer[..written])?;
        }
        Ok(written)
    }

    fn finish_stream(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        self.deflater.finish()?;
        while !self.deflater.is_finished() {
            if self.deflate_chunk()? == 0 && !self.deflater.is_finished() {
                return Err(Error::IncompleteFlush);
            }
        }

        let adler = self.adler.value();
        let mut trailer = PendingBuffer::with_capacity(4);
        trailer.write_short_msb((adler >> 16) as u16);
        trailer.write_short_msb(adler as u16);
        let writer = self.writer_mut()?;
        writer.write_all(&trailer.to_vec())?;
        writer.flush()?;

        log::debug!(
            "zlib stream finished: {} bytes in, {} bytes out, adler32 {:08x}",
            self.deflater.total_in(),
            self.deflater.total_out() + 6,
            self.adler.value()
        );
        self.finished = true;
        self.deflater.close();
        Ok(())
    }
}

impl<W: Write> Write for ZlibEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_input(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        ZlibEncoder::flush(self)?;
        Ok(())
    }
}

impl<W: Write> Drop for ZlibEncoder<W> {
    fn drop(&mut self) {
        if self.finished || self.writer.is_none() {
            return;
        }
        if let Err(err) = self.finish_stream() {
            log::warn!("zlib stream dropped without finish, and finishing failed: {err}");
        }
    }
}

/// Compress `data` into a complete zlib stream.
///
/// # Example
///
/// ```rust
/// use zdeflate::compress::zlib::compress_zlib;
///
/// let stream = compress_zlib(&[], 6).unwrap();
/// assert_eq!(stream, [0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
/// ```
pub fn compress_zlib(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let options = DeflateOptions::default().with_level(level);
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 64), options)?;
    encoder.write_input(data)?;
    encoder.finish()
}
