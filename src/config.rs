//! Centralized configuration for split readers and the CLI driver.
//!
//! Goals:
//! - One place for tunables instead of scattering env lookups.
//! - `SplitConfig::from_env()` reads the `WS_*` variables; fluent `with_*`
//!   setters override individual fields afterwards.
//!
//! Env:
//! - WS_READ_BUFFER_BYTES (default 1 MiB)
//! - WS_SPLIT_BYTES       (default 64 MiB)
//! - WS_FRAME_BYTES       (default 1 MiB)
//! - WS_ZSTD_LEVEL        (default 3)
//! - WS_REPORT_STATUS     (default on; "0|false|off|no" => off)

use std::fmt;

use crate::consts::{
    DEFAULT_FRAME_BYTES, DEFAULT_READ_BUFFER_BYTES, DEFAULT_SPLIT_BYTES, DEFAULT_ZSTD_LEVEL,
    MAX_FRAME_BYTES,
};

#[derive(Clone, Debug)]
pub struct SplitConfig {
    /// Capacity of the buffered reader placed over every opened stream.
    /// Env: WS_READ_BUFFER_BYTES
    pub read_buffer_bytes: usize,

    /// Raw split length used by the driver's split planner.
    /// Env: WS_SPLIT_BYTES
    pub split_bytes: u64,

    /// Uncompressed bytes per frame when writing seekable zstd.
    /// Env: WS_FRAME_BYTES (clamped to the seek table's u32 limit)
    pub frame_bytes: usize,

    /// Compression level for seekable zstd output.
    /// Env: WS_ZSTD_LEVEL
    pub zstd_level: i32,

    /// Push free-text status strings to the metrics sink.
    /// Env: WS_REPORT_STATUS
    pub report_status: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            split_bytes: DEFAULT_SPLIT_BYTES,
            frame_bytes: DEFAULT_FRAME_BYTES,
            zstd_level: DEFAULT_ZSTD_LEVEL,
            report_status: true,
        }
    }
}

fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    !(s == "0" || s == "false" || s == "off" || s == "no")
}

impl SplitConfig {
    /// Load configuration from environment variables on top of the defaults.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("WS_READ_BUFFER_BYTES") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.read_buffer_bytes = n.max(1);
            }
        }

        if let Ok(v) = std::env::var("WS_SPLIT_BYTES") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.split_bytes = n.max(1);
            }
        }

        if let Ok(v) = std::env::var("WS_FRAME_BYTES") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.frame_bytes = n.clamp(1, MAX_FRAME_BYTES);
            }
        }

        if let Ok(v) = std::env::var("WS_ZSTD_LEVEL") {
            if let Ok(n) = v.trim().parse::<i32>() {
                cfg.zstd_level = n;
            }
        }

        if let Ok(v) = std::env::var("WS_REPORT_STATUS") {
            cfg.report_status = env_flag(&v);
        }

        cfg
    }

    pub fn with_read_buffer_bytes(mut self, n: usize) -> Self {
        self.read_buffer_bytes = n.max(1);
        self
    }

    pub fn with_split_bytes(mut self, n: u64) -> Self {
        self.split_bytes = n.max(1);
        self
    }

    pub fn with_frame_bytes(mut self, n: usize) -> Self {
        self.frame_bytes = n.clamp(1, MAX_FRAME_BYTES);
        self
    }

    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level;
        self
    }

    pub fn with_report_status(mut self, on: bool) -> Self {
        self.report_status = on;
        self
    }
}

impl fmt::Display for SplitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SplitConfig {{ \
             read_buffer_bytes: {}, \
             split_bytes: {}, \
             frame_bytes: {}, \
             zstd_level: {}, \
             report_status: {} \
             }}",
            self.read_buffer_bytes,
            self.split_bytes,
            self.frame_bytes,
            self.zstd_level,
            self.report_status,
        )
    }
}
