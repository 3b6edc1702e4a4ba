//! Split (externally assigned byte range) and its codec-adjusted range.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Physical byte range `[start, start + length)` of one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Split {
    pub path: PathBuf,
    pub start: u64,
    pub length: u64,
}

impl Split {
    pub fn new(path: impl AsRef<Path>, start: u64, length: u64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            start,
            length,
        }
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.length)
    }

    pub fn raw_range(&self) -> AdjustedRange {
        AdjustedRange::new(self.start, self.end())
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}+{}", self.path.display(), self.start, self.length)
    }
}

/// Effective scan range after snapping to codec block boundaries.
/// Equals the raw split range for non-splittable codecs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AdjustedRange {
    pub start: u64,
    pub end: u64,
}

impl AdjustedRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Fraction of the range covered by `pos`, clamped to [0, 1]; 1.0 for an empty range.
    pub fn progress(&self, pos: u64) -> f32 {
        if self.is_empty() {
            return 1.0;
        }
        let done = pos.saturating_sub(self.start) as f64 / self.len() as f64;
        done.clamp(0.0, 1.0) as f32
    }
}
