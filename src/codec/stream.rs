//! The three stream shapes a split can be read through.

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use std::io::{self, BufRead, BufReader, Read};

use super::seekable::FrameReader;
use crate::scan::ScanSource;
use crate::split::AdjustedRange;
use crate::storage::SeekRead;

/// Counts bytes pulled from the compressed source (read-ahead included).
pub struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

type Counted = CountingReader<Box<dyn SeekRead>>;

/// Whole-file decompressors (non-splittable codecs).
pub enum WholeDecoder {
    Gzip(MultiGzDecoder<Counted>),
    Bzip2(MultiBzDecoder<Counted>),
    Zstd(zstd::stream::read::Decoder<'static, BufReader<Counted>>),
}

impl WholeDecoder {
    fn compressed_read(&self) -> u64 {
        match self {
            WholeDecoder::Gzip(d) => d.get_ref().count(),
            WholeDecoder::Bzip2(d) => d.get_ref().count(),
            WholeDecoder::Zstd(d) => d.get_ref().get_ref().count(),
        }
    }
}

impl Read for WholeDecoder {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            WholeDecoder::Gzip(d) => d.read(buf),
            WholeDecoder::Bzip2(d) => d.read(buf),
            WholeDecoder::Zstd(d) => d.read(buf),
        }
    }
}

/// A split's byte stream, chosen once at open time.
pub enum SplitStream {
    /// Uncompressed, positioned at the split start.
    Plain {
        inner: BufReader<Box<dyn SeekRead>>,
        origin: u64,
        delivered: u64,
    },
    /// Decompressed from the start of the file; position is compressed bytes read.
    Whole(BufReader<WholeDecoder>),
    /// Frames of a block-splittable file; position moves frame by frame.
    Block(BufReader<FrameReader>),
}

impl SplitStream {
    pub fn plain(src: Box<dyn SeekRead>, origin: u64, buf_bytes: usize) -> Self {
        SplitStream::Plain {
            inner: BufReader::with_capacity(buf_bytes, src),
            origin,
            delivered: 0,
        }
    }

    pub fn gzip(src: Box<dyn SeekRead>, buf_bytes: usize) -> Self {
        let dec = MultiGzDecoder::new(CountingReader::new(src));
        SplitStream::Whole(BufReader::with_capacity(buf_bytes, WholeDecoder::Gzip(dec)))
    }

    pub fn bzip2(src: Box<dyn SeekRead>, buf_bytes: usize) -> Self {
        let dec = MultiBzDecoder::new(CountingReader::new(src));
        SplitStream::Whole(BufReader::with_capacity(buf_bytes, WholeDecoder::Bzip2(dec)))
    }

    pub fn zstd(src: Box<dyn SeekRead>, buf_bytes: usize) -> io::Result<Self> {
        let dec = zstd::stream::read::Decoder::new(CountingReader::new(src))?;
        Ok(SplitStream::Whole(BufReader::with_capacity(
            buf_bytes,
            WholeDecoder::Zstd(dec),
        )))
    }

    pub fn block(frames: FrameReader, buf_bytes: usize) -> Self {
        SplitStream::Block(BufReader::with_capacity(buf_bytes, frames))
    }

    /// Where the prescan's skip-scan stops. Whole-file streams always cover the
    /// entire file as one split, so they simply run to EOF.
    pub fn scan_limit(&self, range: AdjustedRange) -> Option<u64> {
        match self {
            SplitStream::Plain { .. } | SplitStream::Block(_) => Some(range.end),
            SplitStream::Whole(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SplitStream::Plain { .. } => "plain",
            SplitStream::Whole(_) => "whole",
            SplitStream::Block(_) => "block",
        }
    }
}

impl ScanSource for SplitStream {
    fn position(&self) -> u64 {
        match self {
            SplitStream::Plain { origin, delivered, .. } => origin + delivered,
            SplitStream::Whole(r) => r.get_ref().compressed_read(),
            SplitStream::Block(r) => r.get_ref().position(),
        }
    }

    fn byte_granular(&self) -> bool {
        matches!(self, SplitStream::Plain { .. })
    }
}

impl Read for SplitStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SplitStream::Plain {
                inner, delivered, ..
            } => {
                let n = inner.read(buf)?;
                *delivered += n as u64;
                Ok(n)
            }
            SplitStream::Whole(r) => r.read(buf),
            SplitStream::Block(r) => r.read(buf),
        }
    }
}

impl BufRead for SplitStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            SplitStream::Plain { inner, .. } => inner.fill_buf(),
            SplitStream::Whole(r) => r.fill_buf(),
            SplitStream::Block(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            SplitStream::Plain {
                inner, delivered, ..
            } => {
                inner.consume(amt);
                *delivered += amt as u64;
            }
            SplitStream::Whole(r) => r.consume(amt),
            SplitStream::Block(r) => r.consume(amt),
        }
    }
}
