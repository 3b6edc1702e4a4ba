//! Metrics/progress sink handed to readers at construction.
//!
//! Reader code only ever calls `increment(counter, delta)` and `set_status(text)`;
//! nothing is read back. `AtomicMetrics` keeps thread-safe counters that the
//! driver can snapshot, `NullMetrics` drops everything.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Counter {
    FoundPages,
    WrittenPages,
    WrittenRevisions,
}

impl Counter {
    pub const ALL: [Counter; 3] = [
        Counter::FoundPages,
        Counter::WrittenPages,
        Counter::WrittenRevisions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::FoundPages => "found_pages",
            Counter::WrittenPages => "written_pages",
            Counter::WrittenRevisions => "written_revisions",
        }
    }
}

/// Fire-and-forget counters and status line.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: Counter, delta: u64);
    fn set_status(&self, text: &str);
}

#[derive(Debug, Default)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn increment(&self, _counter: Counter, _delta: u64) {}
    fn set_status(&self, _text: &str) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub found_pages: u64,
    pub written_pages: u64,
    pub written_revisions: u64,
    pub status: String,
}

impl MetricsSnapshot {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::FoundPages => self.found_pages,
            Counter::WrittenPages => self.written_pages,
            Counter::WrittenRevisions => self.written_revisions,
        }
    }

    /// Average revisions per written page (0.0 if no pages yet).
    pub fn revisions_per_page(&self) -> f64 {
        if self.written_pages == 0 {
            0.0
        } else {
            self.written_revisions as f64 / self.written_pages as f64
        }
    }

    /// One-line `name=value` summary of every counter.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for c in Counter::ALL {
            out.push_str(&format!("{}={} ", c.name(), self.get(c)));
        }
        out.push_str(&format!("({:.2} revisions/page)", self.revisions_per_page()));
        out
    }
}

#[derive(Debug, Default)]
pub struct AtomicMetrics {
    found_pages: AtomicU64,
    written_pages: AtomicU64,
    written_revisions: AtomicU64,
    status: Mutex<String>,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::FoundPages => &self.found_pages,
            Counter::WrittenPages => &self.written_pages,
            Counter::WrittenRevisions => &self.written_revisions,
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let status = match self.status.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        MetricsSnapshot {
            found_pages: self.found_pages.load(Ordering::Relaxed),
            written_pages: self.written_pages.load(Ordering::Relaxed),
            written_revisions: self.written_revisions.load(Ordering::Relaxed),
            status,
        }
    }

    pub fn reset(&self) {
        self.found_pages.store(0, Ordering::Relaxed);
        self.written_pages.store(0, Ordering::Relaxed);
        self.written_revisions.store(0, Ordering::Relaxed);
        if let Ok(mut s) = self.status.lock() {
            s.clear();
        }
    }
}

impl MetricsSink for AtomicMetrics {
    fn increment(&self, counter: Counter, delta: u64) {
        self.slot(counter).fetch_add(delta, Ordering::Relaxed);
    }

    fn set_status(&self, text: &str) {
        // Отравленный мьютекс статуса не критичен, статус просто теряется.
        if let Ok(mut s) = self.status.lock() {
            s.clear();
            s.push_str(text);
        }
    }
}
