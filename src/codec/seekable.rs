//! Seekable zstd: independent zstd frames followed by a seek table.
//!
//! Layout (all integers little-endian):
//!   [frame 0][frame 1]...[frame n-1]
//!   [skippable magic u32 = 0x184D2A5E][frame_size u32]
//!     n x ([compressed u32][decompressed u32][xxh64 low32 u32]?)
//!     [n u32][descriptor u8 (bit 7: checksums)][seekable magic u32 = 0x8F92EAB1]
//!
//! Frames are the codec's blocks: a split is snapped to the frames whose start
//! offset falls inside it, so adjacent splits partition the frames exactly.

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::debug;
use std::hash::Hasher;
use std::io::{self, BufReader, Read, SeekFrom, Take, Write};
use twox_hash::XxHash64;

use crate::consts::{
    MAX_FRAME_BYTES, SEEKABLE_MAGIC, SEEK_TABLE_CHECKSUM_FLAG, SEEK_TABLE_FOOTER_SIZE,
    SKIPPABLE_FRAME_MAGIC, SKIPPABLE_HDR_SIZE,
};
use crate::split::AdjustedRange;
use crate::storage::SeekRead;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameEntry {
    /// Absolute offset of the frame in the file.
    pub offset: u64,
    pub compressed: u32,
    pub decompressed: u32,
    pub checksum: Option<u32>,
}

impl FrameEntry {
    pub fn end(&self) -> u64 {
        self.offset + self.compressed as u64
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeekTable {
    pub frames: Vec<FrameEntry>,
}

fn xxh64_low32(data: &[u8]) -> u32 {
    let mut h = XxHash64::with_seed(0);
    h.write(data);
    h.finish() as u32
}

impl SeekTable {
    /// Read the seek table at the tail of `src`. `Ok(None)` when the file does not
    /// end with a seekable footer; an error when the footer is present but the
    /// table is inconsistent with the file.
    pub fn read_from(src: &mut dyn SeekRead, file_len: u64) -> Result<Option<SeekTable>> {
        if file_len < (SKIPPABLE_HDR_SIZE + SEEK_TABLE_FOOTER_SIZE) as u64 {
            return Ok(None);
        }
        let mut footer = [0u8; SEEK_TABLE_FOOTER_SIZE];
        src.seek(SeekFrom::Start(file_len - SEEK_TABLE_FOOTER_SIZE as u64))?;
        src.read_exact(&mut footer)?;
        if LittleEndian::read_u32(&footer[5..9]) != SEEKABLE_MAGIC {
            return Ok(None);
        }
        let n = LittleEndian::read_u32(&footer[0..4]) as u64;
        let checksums = footer[4] & SEEK_TABLE_CHECKSUM_FLAG != 0;
        let entry_size: u64 = if checksums { 12 } else { 8 };

        let table_len = n * entry_size + SEEK_TABLE_FOOTER_SIZE as u64;
        let total = SKIPPABLE_HDR_SIZE as u64 + table_len;
        if total > file_len {
            return Err(anyhow!(
                "seek table larger than file: frames={} file_len={}",
                n,
                file_len
            ));
        }

        let table_pos = file_len - total;
        let mut raw = vec![0u8; total as usize - SEEK_TABLE_FOOTER_SIZE];
        src.seek(SeekFrom::Start(table_pos))?;
        src.read_exact(&mut raw)?;
        if LittleEndian::read_u32(&raw[0..4]) != SKIPPABLE_FRAME_MAGIC
            || LittleEndian::read_u32(&raw[4..8]) as u64 != table_len
        {
            return Err(anyhow!("bad seek table header at {}", table_pos));
        }

        let mut frames = Vec::with_capacity(n as usize);
        let mut offset = 0u64;
        for e in raw[SKIPPABLE_HDR_SIZE..].chunks_exact(entry_size as usize) {
            let compressed = LittleEndian::read_u32(&e[0..4]);
            let decompressed = LittleEndian::read_u32(&e[4..8]);
            let checksum = checksums.then(|| LittleEndian::read_u32(&e[8..12]));
            frames.push(FrameEntry {
                offset,
                compressed,
                decompressed,
                checksum,
            });
            offset += compressed as u64;
        }
        if offset != table_pos {
            return Err(anyhow!(
                "seek table covers {} byte(s), data region is {}",
                offset,
                table_pos
            ));
        }
        Ok(Some(SeekTable { frames }))
    }

    /// Offset where frame data ends (start of the seek table frame).
    pub fn data_end(&self) -> u64 {
        self.frames.last().map(|f| f.end()).unwrap_or(0)
    }

    pub fn decompressed_len(&self) -> u64 {
        self.frames.iter().map(|f| f.decompressed as u64).sum()
    }

    /// Frames whose start lies in `[start, end)`, with the range snapped to them.
    /// An empty selection yields an empty range at the first frame boundary ≥ start.
    pub fn snap(&self, start: u64, end: u64) -> (Vec<FrameEntry>, AdjustedRange) {
        let picked: Vec<FrameEntry> = self
            .frames
            .iter()
            .filter(|f| f.offset >= start && f.offset < end)
            .copied()
            .collect();
        let range = match (picked.first(), picked.last()) {
            (Some(first), Some(last)) => AdjustedRange::new(first.offset, last.end()),
            _ => {
                let at = self
                    .frames
                    .iter()
                    .map(|f| f.offset)
                    .find(|&o| o >= start)
                    .unwrap_or_else(|| self.data_end());
                AdjustedRange::new(at, at)
            }
        };
        (picked, range)
    }
}

/// Write `input` as seekable zstd: one frame per `frame_bytes` of input.
pub fn write_seekable<R: Read, W: Write>(
    mut input: R,
    mut out: W,
    frame_bytes: usize,
    level: i32,
    checksums: bool,
) -> Result<SeekTable> {
    let frame_bytes = frame_bytes.clamp(1, MAX_FRAME_BYTES);
    let mut chunk = vec![0u8; frame_bytes];
    let mut table = SeekTable::default();
    let mut offset = 0u64;

    loop {
        let n = read_full(&mut input, &mut chunk)?;
        if n == 0 {
            break;
        }
        let data = &chunk[..n];
        let frame = zstd::bulk::compress(data, level).context("zstd compress frame")?;
        out.write_all(&frame)?;
        table.frames.push(FrameEntry {
            offset,
            compressed: frame.len() as u32,
            decompressed: n as u32,
            checksum: checksums.then(|| xxh64_low32(data)),
        });
        offset += frame.len() as u64;
        if n < frame_bytes {
            break;
        }
    }

    let entry_size: u32 = if checksums { 12 } else { 8 };
    let table_len = table.frames.len() as u32 * entry_size + SEEK_TABLE_FOOTER_SIZE as u32;
    out.write_u32::<LittleEndian>(SKIPPABLE_FRAME_MAGIC)?;
    out.write_u32::<LittleEndian>(table_len)?;
    for f in &table.frames {
        out.write_u32::<LittleEndian>(f.compressed)?;
        out.write_u32::<LittleEndian>(f.decompressed)?;
        if let Some(c) = f.checksum {
            out.write_u32::<LittleEndian>(c)?;
        }
    }
    out.write_u32::<LittleEndian>(table.frames.len() as u32)?;
    out.write_u8(if checksums { SEEK_TABLE_CHECKSUM_FLAG } else { 0 })?;
    out.write_u32::<LittleEndian>(SEEKABLE_MAGIC)?;
    out.flush()?;

    debug!(
        "seekable zstd written: {} frame(s), {} compressed byte(s)",
        table.frames.len(),
        offset
    );
    Ok(table)
}

fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

type FrameDecoder = zstd::stream::read::Decoder<'static, BufReader<Take<Box<dyn SeekRead>>>>;

/// Decodes a run of frames back to back. `position()` is the start offset of the
/// frame currently being decoded, and the range end once all frames are done.
pub struct FrameReader {
    src: Option<Box<dyn SeekRead>>,
    decoder: Option<FrameDecoder>,
    frames: Vec<FrameEntry>,
    next: usize,
    position: u64,
    end: u64,
    produced: u64,
    hasher: XxHash64,
}

impl FrameReader {
    pub fn new(src: Box<dyn SeekRead>, frames: Vec<FrameEntry>, range: AdjustedRange) -> Self {
        Self {
            src: Some(src),
            decoder: None,
            frames,
            next: 0,
            position: range.start,
            end: range.end,
            produced: 0,
            hasher: XxHash64::with_seed(0),
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    fn open_frame(&mut self, mut src: Box<dyn SeekRead>) -> io::Result<()> {
        let f = self.frames[self.next];
        src.seek(SeekFrom::Start(f.offset))?;
        self.decoder = Some(zstd::stream::read::Decoder::new(src.take(f.compressed as u64))?);
        self.position = f.offset;
        self.produced = 0;
        self.hasher = XxHash64::with_seed(0);
        Ok(())
    }

    fn check_frame(&self) -> io::Result<()> {
        let f = self.frames[self.next - 1];
        if self.produced != f.decompressed as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame at {} decoded to {} byte(s), seek table says {}",
                    f.offset, self.produced, f.decompressed
                ),
            ));
        }
        if let Some(expected) = f.checksum {
            if self.hasher.finish() as u32 != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("checksum mismatch in frame at {}", f.offset),
                ));
            }
        }
        Ok(())
    }
}

impl Read for FrameReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.decoder.take() {
                Some(mut dec) => {
                    let n = dec.read(buf)?;
                    if n > 0 {
                        self.produced += n as u64;
                        self.hasher.write(&buf[..n]);
                        self.decoder = Some(dec);
                        return Ok(n);
                    }
                    self.next += 1;
                    self.check_frame()?;
                    self.src = Some(dec.finish().into_inner().into_inner());
                }
                None => {
                    if self.next >= self.frames.len() {
                        self.position = self.end;
                        return Ok(0);
                    }
                    // Источник уже потерян после ошибки, ведём себя как EOF.
                    let src = match self.src.take() {
                        Some(s) => s,
                        None => return Ok(0),
                    };
                    self.open_frame(src)?;
                }
            }
        }
    }
}
