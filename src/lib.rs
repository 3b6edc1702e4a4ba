//! wikisplit: split-aware record reader for large nested XML dumps.
//!
//! A dump (`<page>…<revision>…</revision>…</page>`, optionally gzip / zstd /
//! seekable zstd compressed) is cut into byte-range splits by someone else.
//! For each split a `RecordReader` resynchronizes to page boundaries and
//! emits one self-contained `<page>` record per revision.

// Базовые модули
pub mod consts;
pub mod config;
pub mod metrics;
pub mod split;
pub mod storage;

// Кодеки и два прохода по сплиту
pub mod codec;  // src/codec/{mod,stream,seekable}.rs
pub mod scan;   // src/scan/{mod,boundaries}.rs
pub mod reader; // src/reader/{mod,record,shared}.rs

pub mod driver;
pub mod cli;

// Удобные реэкспорты
pub use codec::{Codec, CodecRegistry};
pub use config::SplitConfig;
pub use metrics::{AtomicMetrics, Counter, MetricsSink, MetricsSnapshot, NullMetrics};
pub use reader::{ReaderState, RecordReader, SharedReader};
pub use scan::PageBoundaries;
pub use split::{AdjustedRange, Split};
pub use storage::{LocalFs, MemStorage, Storage};
