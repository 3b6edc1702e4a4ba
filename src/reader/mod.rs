//! RecordReader: turns one split into self-contained page+revision records.
//!
//! Two passes over the split:
//! 1. prescan (`scan_page_boundaries`): complete pages inside the split;
//! 2. emission: walk forward one `<revision` at a time, switch page context
//!    when the cursor crosses the next recorded page begin, and emit
//!    `header · carried · revision · </page>`.
//!
//! States: Uninitialized → Scanning → (Emitting ⇄ AdvancingPage) → Exhausted.
//! Exhausted is terminal for the instance.
//!
//! Ограничение: ревизия, чей `</revision>` не найден до конца потока, не
//! эмитится; страница, пересекающая конец сплита, дочитывается соседним
//! сплитом только начиная с первой целой ревизии после границы.

use anyhow::Result;
use log::{debug, info, warn};
use std::sync::Arc;

pub mod record;
pub mod shared;

pub use record::{assemble_into, CarriedContext};
pub use shared::SharedReader;

use crate::codec::{Codec, CodecRegistry, FileCodec, SplitStream};
use crate::config::SplitConfig;
use crate::consts::{ORPHAN_PAGE_HEADER, PAGE_BEGIN, REVISION_BEGIN, REVISION_END};
use crate::metrics::{Counter, MetricsSink};
use crate::scan::{
    rfind_index, scan_page_boundaries, scan_until, slice_range, ByteCounter, PageBoundaries,
    ScanSource,
};
use crate::split::{AdjustedRange, Split};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    Uninitialized,
    Scanning,
    Emitting,
    AdvancingPage,
    Exhausted,
}

pub struct RecordReader {
    split: Split,
    registry: CodecRegistry,
    metrics: Arc<dyn MetricsSink>,
    cfg: SplitConfig,
    codec: FileCodec,
    range: AdjustedRange,

    stream: Option<SplitStream>,
    last_position: u64,
    state: ReaderState,

    boundaries: PageBoundaries,
    counter: ByteCounter,
    current_page: Option<usize>,

    page_header: Vec<u8>,
    carried: CarriedContext,
    before_rev: Vec<u8>,
    in_rev: Vec<u8>,
}

impl RecordReader {
    /// Resolve the codec (and seek table) and adjusted range of `split` once.
    /// Streams are opened lazily by `init()` (first `produce_next` call at the latest).
    pub fn open(
        registry: CodecRegistry,
        split: Split,
        metrics: Arc<dyn MetricsSink>,
        cfg: SplitConfig,
    ) -> Result<Self> {
        // Проверяем, что файл вообще открывается: ошибка сразу, а не на первом next.
        registry.storage().len(&split.path)?;
        let codec = registry.resolve(&split.path)?;
        let range = codec.adjusted_range(&split);
        info!(
            "record reader for {} codec={} adjusted=[{}, {})",
            split,
            codec.codec.name(),
            range.start,
            range.end
        );
        if cfg.report_status {
            metrics.set_status(&split.to_string());
        }

        Ok(Self {
            split,
            registry,
            metrics,
            cfg,
            codec,
            range,
            stream: None,
            last_position: range.start,
            state: ReaderState::Uninitialized,
            boundaries: PageBoundaries::new(),
            counter: ByteCounter::new(),
            current_page: None,
            page_header: ORPHAN_PAGE_HEADER.to_vec(),
            carried: CarriedContext::default(),
            before_rev: Vec::new(),
            in_rev: Vec::new(),
        })
    }

    /// Reset cursor and carried context, prescan the split, and reopen it for
    /// emission at the adjusted start. An exhausted reader stays exhausted and
    /// keeps no stream open.
    pub fn init(&mut self) -> Result<()> {
        let was_exhausted = self.state == ReaderState::Exhausted;
        self.state = ReaderState::Scanning;

        self.page_header.clear();
        self.page_header.extend_from_slice(ORPHAN_PAGE_HEADER);
        self.carried.reset();
        self.current_page = None;
        self.counter.reset();
        self.boundaries.clear();
        if let Some(old) = self.stream.take() {
            self.last_position = old.position();
        }

        let (mut scan, range) =
            self.registry
                .open_resolved(&self.codec, &self.split, self.cfg.read_buffer_bytes)?;
        self.range = range;
        let stop_at = scan.scan_limit(range);
        self.boundaries = scan_page_boundaries(
            &mut scan,
            stop_at,
            self.metrics.as_ref(),
            self.cfg.report_status,
        )?;
        drop(scan);

        if was_exhausted {
            self.state = ReaderState::Exhausted;
            debug!("split {} already exhausted, stream stays closed", self.split);
            return Ok(());
        }

        let (stream, _) =
            self.registry
                .open_resolved(&self.codec, &self.split, self.cfg.read_buffer_bytes)?;
        self.last_position = stream.position();
        self.stream = Some(stream);

        self.state = if self.boundaries.is_empty() {
            ReaderState::Exhausted
        } else {
            ReaderState::Emitting
        };
        info!(
            "split {}: {} complete page(s) {:?}",
            self.split,
            self.boundaries.page_count(),
            self.state
        );
        Ok(())
    }

    /// Empty key buffer for `produce_next`.
    pub fn create_key(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Empty secondary value; records carry no value.
    pub fn create_value(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Fill `key` with the next record. `Ok(false)` means the split is exhausted.
    pub fn produce_next(&mut self, key: &mut Vec<u8>, value: &mut Vec<u8>) -> Result<bool> {
        key.clear();
        value.clear();

        if matches!(self.state, ReaderState::Uninitialized | ReaderState::Scanning) {
            self.init()?;
            if self.boundaries.is_empty() {
                return Ok(false);
            }
            self.metrics.increment(Counter::WrittenRevisions, 0);
            self.metrics.increment(Counter::WrittenPages, 0);
        }
        if self.state == ReaderState::Exhausted {
            return Ok(false);
        }

        if self.next_record(key)? {
            Ok(true)
        } else {
            self.state = ReaderState::Exhausted;
            Ok(false)
        }
    }

    /// Iterator over the remaining records; stops after the first error.
    pub fn records(&mut self) -> Records<'_> {
        Records {
            reader: self,
            failed: false,
        }
    }

    fn next_record(&mut self, out: &mut Vec<u8>) -> Result<bool> {
        let tail = self.tail_page_end();
        let page_count = self.boundaries.page_count();
        if matches!(self.current_page, Some(p) if p >= page_count) || self.counter.count() >= tail {
            return Ok(false);
        }
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Ok(false),
        };

        // До начала следующей ревизии.
        self.before_rev.clear();
        if !scan_until(stream, &mut self.counter, None, REVISION_BEGIN, Some(&mut self.before_rev))?
            || self.counter.count() >= tail
        {
            return Ok(false);
        }

        if self.counter.count() >= self.next_page_begin() {
            self.advance_page()?;
        }

        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Ok(false),
        };
        self.in_rev.clear();
        if !scan_until(stream, &mut self.counter, None, REVISION_END, Some(&mut self.in_rev))? {
            info!("no revision end: split={} bytes={}", self.split, self.counter.count());
            return Ok(false);
        }
        self.last_position = stream.position();

        assemble_into(out, &self.page_header, &self.carried, &self.in_rev);
        self.metrics.increment(Counter::WrittenRevisions, 1);
        if self.cfg.report_status {
            self.metrics.set_status(&format!(
                "write new record pos={} bytes={}",
                self.last_position,
                self.counter.count()
            ));
        }
        debug!(
            "record: page={:?} len={} pos={} bytes={} next={}",
            self.current_page,
            out.len(),
            self.last_position,
            self.counter.count(),
            self.next_page_begin()
        );

        self.carried.carry(&self.in_rev);
        Ok(true)
    }

    /// The cursor crossed into a new page: take its header from the bytes just
    /// read and move past every page begin already behind the cursor.
    fn advance_page(&mut self) -> Result<()> {
        self.state = ReaderState::AdvancingPage;
        match rfind_index(&self.before_rev, PAGE_BEGIN) {
            Some(off) => {
                let to = self.before_rev.len() - REVISION_BEGIN.len();
                let header = slice_range(&self.before_rev, off, to)?;
                self.page_header.clear();
                self.page_header.extend_from_slice(header);
                self.carried.reset();

                let mut next = self.next_page_index();
                while let Some(begin) = self.boundaries.begin(next) {
                    if self.counter.count() < begin {
                        break;
                    }
                    self.current_page = Some(next);
                    next += 1;
                }
                self.metrics.increment(Counter::WrittenPages, 1);
            }
            None => {
                // Граница по учёту пройдена, а маркера нет, оставляем прежний заголовок.
                warn!(
                    "pattern not found: {} in {} byte(s) before revision (bytes={})",
                    String::from_utf8_lossy(PAGE_BEGIN),
                    self.before_rev.len(),
                    self.counter.count()
                );
            }
        }
        self.state = ReaderState::Emitting;
        Ok(())
    }

    fn next_page_index(&self) -> usize {
        self.current_page.map_or(0, |p| p + 1)
    }

    /// Begin offset of the page after the current one; `u64::MAX` if none.
    pub fn next_page_begin(&self) -> u64 {
        self.boundaries
            .begin(self.next_page_index())
            .unwrap_or(u64::MAX)
    }

    /// Last complete page's `</page>` offset (0 if none). Nothing at or after it is emitted.
    pub fn tail_page_end(&self) -> u64 {
        self.boundaries.tail_end()
    }

    /// Position of the emission stream in storage units.
    pub fn position(&self) -> u64 {
        match self.stream.as_ref() {
            Some(s) => s.position(),
            None => self.last_position,
        }
    }

    /// `(position - start) / (end - start)` clamped to [0, 1]; 1.0 for an empty range.
    pub fn progress(&self) -> f32 {
        self.range.progress(self.position())
    }

    /// Bytes consumed by the emission pass.
    pub fn read_bytes(&self) -> u64 {
        self.counter.count()
    }

    pub fn boundaries(&self) -> &PageBoundaries {
        &self.boundaries
    }

    pub fn current_page(&self) -> Option<usize> {
        self.current_page
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn range(&self) -> AdjustedRange {
        self.range
    }

    pub fn codec(&self) -> Codec {
        self.codec.codec
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    /// Release the stream. Idempotent; the reader reports exhaustion afterwards.
    pub fn close(&mut self) {
        if let Some(s) = self.stream.take() {
            self.last_position = s.position();
            debug!("closed split {}", self.split);
        }
        self.state = ReaderState::Exhausted;
    }
}

pub struct Records<'a> {
    reader: &'a mut RecordReader,
    failed: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut key = self.reader.create_key();
        let mut value = self.reader.create_value();
        match self.reader.produce_next(&mut key, &mut value) {
            Ok(true) => Some(Ok(key)),
            Ok(false) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
