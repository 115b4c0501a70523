//! Streaming compression codec for event log files.
//!
//! The algorithm is a per-recorder constant; mid-stream changes are not
//! supported. Because reading a compressed log requires terminating the
//! active zstd frame, a log file that has been read and then appended to
//! holds several concatenated frames. [`CompressedReader`] decodes across
//! frame boundaries.

use std::io::{self, BufRead, Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("codec init failed: {0}")]
    Init(#[source] io::Error),

    #[error("codec write failed: {0}")]
    Write(#[source] io::Error),

    #[error("codec read failed: {0}")]
    Read(#[source] io::Error),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Compression algorithm applied to a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    #[default]
    Zstd,
}

/// Compress an entire byte buffer.
pub fn compress_all(data: &[u8], compression: Compression) -> CodecResult<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Zstd => zstd::stream::encode_all(data, 0).map_err(CodecError::Write),
    }
}

/// Decompress an entire byte buffer, including concatenated frames.
pub fn decompress_all(data: &[u8], compression: Compression) -> CodecResult<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Zstd => zstd::stream::decode_all(data).map_err(CodecError::Read),
    }
}

/// Writer that compresses data before handing it to the wrapped sink.
pub enum CompressedWriter<W: Write> {
    Plain(W),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> CompressedWriter<W> {
    pub fn new(sink: W, compression: Compression) -> CodecResult<Self> {
        match compression {
            Compression::None => Ok(Self::Plain(sink)),
            Compression::Zstd => {
                let encoder = zstd::stream::write::Encoder::new(sink, 0).map_err(CodecError::Init)?;
                Ok(Self::Zstd(encoder))
            }
        }
    }

    /// Flush the wrapped sink without flushing the compression layer.
    ///
    /// Under zstd the encoder keeps buffering its current block; only bytes
    /// it has already emitted reach the sink. The frame is completed by
    /// [`CompressedWriter::finish`].
    pub fn flush_sink(&mut self) -> CodecResult<()> {
        match self {
            Self::Plain(w) => w.flush().map_err(CodecError::Write),
            Self::Zstd(encoder) => encoder.get_mut().flush().map_err(CodecError::Write),
        }
    }

    /// Terminate the compression frame and return the wrapped sink.
    pub fn finish(self) -> CodecResult<W> {
        match self {
            Self::Plain(w) => Ok(w),
            Self::Zstd(encoder) => encoder.finish().map_err(CodecError::Write),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Zstd(encoder) => encoder.flush(),
        }
    }
}

/// Reader that decompresses data from the wrapped source.
pub enum CompressedReader<R: BufRead> {
    Plain(R),
    Zstd(zstd::stream::read::Decoder<'static, R>),
}

impl<R: BufRead> CompressedReader<R> {
    pub fn new(source: R, compression: Compression) -> CodecResult<Self> {
        match compression {
            Compression::None => Ok(Self::Plain(source)),
            Compression::Zstd => {
                let decoder =
                    zstd::stream::read::Decoder::with_buffer(source).map_err(CodecError::Init)?;
                Ok(Self::Zstd(decoder))
            }
        }
    }
}

impl<R: BufRead> Read for CompressedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(r) => r.read(buf),
            Self::Zstd(decoder) => decoder.read(buf),
        }
    }
}
