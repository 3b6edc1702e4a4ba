use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::codec::write_seekable;
use crate::config::SplitConfig;

/// Перепаковка в seekable zstd: после этого файл режется на сплиты по кадрам.
pub fn cmd_pack(input: &Path, out: &Path, cfg: &SplitConfig, checksums: bool) -> Result<()> {
    let src = OpenOptions::new()
        .read(true)
        .open(input)
        .with_context(|| format!("open input {}", input.display()))?;
    let dst = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(out)
        .with_context(|| format!("open out {}", out.display()))?;

    let table = write_seekable(
        BufReader::with_capacity(cfg.read_buffer_bytes, src),
        BufWriter::new(dst),
        cfg.frame_bytes,
        cfg.zstd_level,
        checksums,
    )?;

    println!(
        "Packed {} B into {} frame(s) ({} B compressed) -> {}",
        table.decompressed_len(),
        table.frames.len(),
        table.data_end(),
        out.display()
    );
    Ok(())
}
