//! Caller-owned loop helpers: plan splits for a file and drain one split.
//!
//! Split assignment and scheduling belong to whoever runs the readers; these
//! helpers are what the CLI (and tests) use to drive them locally.

use anyhow::Result;
use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::config::SplitConfig;
use crate::metrics::MetricsSink;
use crate::reader::RecordReader;
use crate::split::Split;

/// Fixed-size splits of `split_bytes` for splittable files, a single whole-file
/// split otherwise. An empty file yields one empty split.
pub fn plan_splits(registry: &CodecRegistry, path: &Path, split_bytes: u64) -> Result<Vec<Split>> {
    let len = registry.storage().len(path)?;
    let codec = registry.codec_for(path)?;
    if !codec.is_splittable() || len == 0 {
        return Ok(vec![Split::new(path, 0, len)]);
    }

    let step = split_bytes.max(1);
    let mut out = Vec::with_capacity((len / step + 1) as usize);
    let mut start = 0u64;
    while start < len {
        let length = step.min(len - start);
        out.push(Split::new(path, start, length));
        start += length;
    }
    info!(
        "planned {} split(s) of {} for {} ({} B, codec={})",
        out.len(),
        step,
        path.display(),
        len,
        codec.name()
    );
    Ok(out)
}

/// Drain `reader`, handing every record to `f`. Returns the number of records.
pub fn run_split<F>(reader: &mut RecordReader, mut f: F) -> Result<u64>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut key = reader.create_key();
    let mut value = reader.create_value();
    let mut n = 0u64;
    while reader.produce_next(&mut key, &mut value)? {
        f(&key)?;
        n += 1;
    }
    reader.close();
    Ok(n)
}

/// Open and drain every split of `path` in order.
pub fn run_file<F>(
    registry: &CodecRegistry,
    path: &Path,
    metrics: Arc<dyn MetricsSink>,
    cfg: &SplitConfig,
    mut f: F,
) -> Result<u64>
where
    F: FnMut(&Split, &[u8]) -> Result<()>,
{
    let mut total = 0u64;
    for split in plan_splits(registry, path, cfg.split_bytes)? {
        let mut reader =
            RecordReader::open(registry.clone(), split.clone(), metrics.clone(), cfg.clone())?;
        total += run_split(&mut reader, |rec| f(&split, rec))?;
    }
    Ok(total)
}
