//! Streaming marker scan over a buffered source.
//!
//! - `ByteCounter`: monotonic count of bytes consumed since the stream was opened.
//! - `scan_until`: finds the next occurrence of a literal marker, optionally
//!   capturing every consumed byte; skip-scans may stop early at a logical end.
//! - `find_index` / `rfind_index`: the same marker search inside a captured buffer.
//!
//! Поиск наивный (без KMP): маркеры короткие и фиксированные, а '<' встречается
//! в каждом из них только первым символом.

use anyhow::{anyhow, Result};
use std::io::{self, BufRead};

pub mod boundaries;

pub use boundaries::{scan_page_boundaries, PageBoundaries};

/// Bytes consumed from a stream since open. Boundary offsets and the read
/// cursor are both measured in these units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteCounter {
    count: u64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proceed(&mut self, n: u64) {
        self.count += n;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Buffered source that can report where it is in the underlying storage.
pub trait ScanSource: BufRead {
    /// Current position in storage units (absolute byte offset for plain streams).
    fn position(&self) -> u64;

    /// True when `position()` advances one unit per consumed byte. Block-compressed
    /// sources report block offsets instead.
    fn byte_granular(&self) -> bool {
        true
    }
}

impl<T: AsRef<[u8]>> ScanSource for io::Cursor<T> {
    fn position(&self) -> u64 {
        io::Cursor::position(self)
    }
}

/// Consume bytes until `pattern` has been fully matched.
///
/// Returns `Ok(true)` right after the last byte of the marker, `Ok(false)` at end
/// of stream. Every consumed byte is counted and, with `capture`, appended to it.
/// Without `capture`, scanning also stops (returning `Ok(false)`) once the source
/// position reaches `stop_at` while no partial match is pending. With `capture`
/// `stop_at` is ignored: the emitting pass may read past the split end to finish
/// what it started.
pub fn scan_until<S: ScanSource + ?Sized>(
    src: &mut S,
    counter: &mut ByteCounter,
    stop_at: Option<u64>,
    pattern: &[u8],
    mut capture: Option<&mut Vec<u8>>,
) -> Result<bool> {
    if pattern.is_empty() {
        return Err(anyhow!("scan pattern must not be empty"));
    }
    let stop_at = if capture.is_some() { None } else { stop_at };
    let mut i = 0usize;

    loop {
        let avail = src.fill_buf()?.len();
        if avail == 0 {
            return Ok(false);
        }
        // Позиция до потребления текущего буфера.
        let base = src.position();
        let granular = src.byte_granular();

        let chunk = src.fill_buf()?;
        let mut used = 0usize;
        let mut found = false;
        let mut stopped = false;

        for &b in chunk {
            used += 1;
            if b == pattern[i] {
                i += 1;
                if i == pattern.len() {
                    found = true;
                    break;
                }
            } else {
                i = usize::from(b == pattern[0]);
            }
            if let Some(end) = stop_at {
                let pos = if granular { base + used as u64 } else { base };
                if i == 0 && pos >= end {
                    stopped = true;
                    break;
                }
            }
        }

        if let Some(buf) = capture.as_deref_mut() {
            buf.extend_from_slice(&chunk[..used]);
        }
        src.consume(used);
        counter.proceed(used as u64);

        if found {
            return Ok(true);
        }
        if stopped {
            return Ok(false);
        }
    }
}

/// Offset of the first occurrence of `pattern` in `buf`.
pub fn find_index(buf: &[u8], pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > buf.len() {
        return None;
    }
    buf.windows(pattern.len()).position(|w| w == pattern)
}

/// Offset of the last occurrence of `pattern` in `buf`.
pub fn rfind_index(buf: &[u8], pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > buf.len() {
        return None;
    }
    buf.windows(pattern.len()).rposition(|w| w == pattern)
}

/// `buf[from..to]`, or an error for offsets that cannot come from correct bookkeeping.
pub fn slice_range(buf: &[u8], from: usize, to: usize) -> Result<&[u8]> {
    if from >= buf.len() || to > buf.len() || from > to {
        return Err(anyhow!(
            "invalid offset: offset={} end={} length={}",
            from,
            to,
            buf.len()
        ));
    }
    Ok(&buf[from..to])
}
