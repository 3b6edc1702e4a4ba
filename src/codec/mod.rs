//! Codec registry and the adapter that opens a split as one position-reporting stream.
//!
//! Codecs are picked from the path:
//! - `*.gz`: gzip, whole-file only
//! - `*.bz2`: bzip2, whole-file only
//! - `*.zst`: seekable zstd if the file ends with a seek table (splittable),
//!             otherwise plain zstd (whole-file only)
//! - anything else: uncompressed

use anyhow::{anyhow, Context, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;

pub mod seekable;
pub mod stream;

pub use seekable::{write_seekable, FrameEntry, FrameReader, SeekTable};
pub use stream::SplitStream;

use crate::split::{AdjustedRange, Split};
use crate::storage::Storage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    None,
    Gzip,
    Bzip2,
    Zstd,
    SeekableZstd,
}

impl Codec {
    pub fn is_splittable(self) -> bool {
        matches!(self, Codec::None | Codec::SeekableZstd)
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Gzip => "gzip",
            Codec::Bzip2 => "bzip2",
            Codec::Zstd => "zstd",
            Codec::SeekableZstd => "zstd-seekable",
        }
    }
}

/// Codec of one file, resolved once. Seekable files carry their seek table.
#[derive(Clone, Debug)]
pub struct FileCodec {
    pub codec: Codec,
    table: Option<Arc<SeekTable>>,
}

impl FileCodec {
    pub fn table(&self) -> Option<&SeekTable> {
        self.table.as_deref()
    }

    /// Effective `[start, end)` for `split`.
    pub fn adjusted_range(&self, split: &Split) -> AdjustedRange {
        match self.table() {
            Some(t) => t.snap(split.start, split.end()).1,
            None => split.raw_range(),
        }
    }
}

#[derive(Clone)]
pub struct CodecRegistry {
    storage: Arc<dyn Storage>,
}

impl CodecRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Pick the codec for `path`; `.zst` files are checked for a seek table.
    pub fn resolve(&self, path: &Path) -> Result<FileCodec> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let plain = |codec| FileCodec { codec, table: None };
        match ext.as_str() {
            "gz" => Ok(plain(Codec::Gzip)),
            "bz2" => Ok(plain(Codec::Bzip2)),
            "zst" => match self.seek_table(path)? {
                Some(t) => Ok(FileCodec {
                    codec: Codec::SeekableZstd,
                    table: Some(Arc::new(t)),
                }),
                None => Ok(plain(Codec::Zstd)),
            },
            _ => Ok(plain(Codec::None)),
        }
    }

    pub fn codec_for(&self, path: &Path) -> Result<Codec> {
        Ok(self.resolve(path)?.codec)
    }

    pub fn is_splittable(&self, path: &Path) -> Result<bool> {
        Ok(self.codec_for(path)?.is_splittable())
    }

    fn seek_table(&self, path: &Path) -> Result<Option<SeekTable>> {
        let len = self.storage.len(path)?;
        let mut src = self.storage.open(path)?;
        SeekTable::read_from(src.as_mut(), len)
            .with_context(|| format!("read seek table of {}", path.display()))
    }

    /// Effective `[start, end)` for `split` without opening a data stream.
    pub fn adjusted_range(&self, split: &Split) -> Result<AdjustedRange> {
        Ok(self.resolve(&split.path)?.adjusted_range(split))
    }

    /// Open `split` as a stream whose ByteCounter origin is the adjusted start.
    pub fn open(&self, split: &Split, buf_bytes: usize) -> Result<(SplitStream, AdjustedRange)> {
        let fc = self.resolve(&split.path)?;
        self.open_resolved(&fc, split, buf_bytes)
    }

    /// Same as `open` with the codec already resolved.
    pub fn open_resolved(
        &self,
        fc: &FileCodec,
        split: &Split,
        buf_bytes: usize,
    ) -> Result<(SplitStream, AdjustedRange)> {
        let codec = fc.codec;
        let path = &split.path;

        let opened = match (codec, fc.table()) {
            (Codec::SeekableZstd, Some(table)) => {
                let (frames, range) = table.snap(split.start, split.end());
                let src = self.storage.open(path)?;
                let reader = FrameReader::new(src, frames, range);
                (SplitStream::block(reader, buf_bytes), range)
            }
            (Codec::SeekableZstd, None) => {
                return Err(anyhow!("seek table missing for {}", path.display()));
            }
            (Codec::None, _) => {
                let src = self.storage.open_at(path, split.start)?;
                (SplitStream::plain(src, split.start, buf_bytes), split.raw_range())
            }
            (Codec::Gzip | Codec::Bzip2 | Codec::Zstd, _) => {
                // Без поддержки seek посреди потока: сплит обязан начинаться с 0.
                if split.start != 0 {
                    return Err(anyhow!(
                        "{} is {}-compressed and not splittable; split must start at 0, got {}",
                        path.display(),
                        codec.name(),
                        split.start
                    ));
                }
                let src = self.storage.open(path)?;
                let stream = match codec {
                    Codec::Gzip => SplitStream::gzip(src, buf_bytes),
                    Codec::Bzip2 => SplitStream::bzip2(src, buf_bytes),
                    _ => SplitStream::zstd(src, buf_bytes)
                        .with_context(|| format!("create zstd decoder for {}", path.display()))?,
                };
                (stream, split.raw_range())
            }
        };

        info!(
            "opened split {} codec={} stream={} adjusted=[{}, {})",
            split,
            codec.name(),
            opened.0.kind(),
            opened.1.start,
            opened.1.end
        );
        Ok(opened)
    }
}
