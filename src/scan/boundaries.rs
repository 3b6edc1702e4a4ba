//! Page-boundary prescan (first pass over a split).
//!
//! Produces the ordered `[begin_0, end_0, begin_1, end_1, ...]` offsets of every
//! complete page whose `<page>` lies inside the split. Offsets are ByteCounter
//! units (bytes since the stream was opened) and point at the first byte of the
//! `<page>` / `</page>` marker. A page whose close lies past the split end is
//! dropped here; the split that follows picks up its remaining revisions.

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;

use super::{scan_until, ByteCounter, ScanSource};
use crate::consts::{PAGE_BEGIN, PAGE_END};
use crate::metrics::{Counter, MetricsSink};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PageBoundaries {
    offsets: Vec<u64>,
}

impl PageBoundaries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of complete pages.
    pub fn page_count(&self) -> usize {
        self.offsets.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn begin(&self, page: usize) -> Option<u64> {
        self.offsets.get(page * 2).copied()
    }

    pub fn end(&self, page: usize) -> Option<u64> {
        self.offsets.get(page * 2 + 1).copied()
    }

    /// Last recorded `</page>` offset, or 0 if there is none.
    pub fn tail_end(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.offsets
    }

    /// `(begin, end)` pairs in order.
    pub fn pages(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.offsets.chunks_exact(2).map(|p| (p[0], p[1]))
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }
}

/// Scan `src` for complete pages, stopping at `stop_at` (see `scan_until`) or EOF.
///
/// Each page found bumps `found_pages` on the sink. With `report_status` the sink's
/// status line is refreshed after every page.
pub fn scan_page_boundaries<S: ScanSource + ?Sized>(
    src: &mut S,
    stop_at: Option<u64>,
    metrics: &dyn MetricsSink,
    report_status: bool,
) -> Result<PageBoundaries> {
    let mut counter = ByteCounter::new();
    let mut out = PageBoundaries::new();
    let past_end = |s: &S| matches!(stop_at, Some(end) if s.position() >= end);

    loop {
        if past_end(src) || !scan_until(src, &mut counter, stop_at, PAGE_BEGIN, None)? {
            break;
        }
        out.offsets.push(counter.count() - PAGE_BEGIN.len() as u64);

        if past_end(src) || !scan_until(src, &mut counter, stop_at, PAGE_END, None)? {
            warn!(
                "could not find {}, page over a split? pos={} bytes={}",
                String::from_utf8_lossy(PAGE_END),
                src.position(),
                counter.count()
            );
            out.offsets.pop();
            break;
        }
        out.offsets.push(counter.count() - PAGE_END.len() as u64);

        metrics.increment(Counter::FoundPages, 1);
        if report_status {
            metrics.set_status(&format!(
                "find page {:6} pos={} end={} bytes={}",
                out.page_count(),
                src.position(),
                stop_at.map(|e| e.to_string()).unwrap_or_else(|| "eof".into()),
                counter.count()
            ));
        }
    }

    debug!("prescan done: {} page(s), {} byte(s)", out.page_count(), counter.count());
    Ok(out)
}
