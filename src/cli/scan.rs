use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::config::SplitConfig;
use crate::driver::plan_splits;
use crate::metrics::{AtomicMetrics, MetricsSnapshot};
use crate::reader::RecordReader;
use crate::split::{AdjustedRange, Split};

/// Печать плана сплитов (как его видит драйвер).
pub fn cmd_splits(registry: &CodecRegistry, path: &Path, cfg: &SplitConfig, json: bool) -> Result<()> {
    let codec = registry.codec_for(path)?;
    let splits = plan_splits(registry, path, cfg.split_bytes)?;

    if json {
        println!("{}", serde_json::to_string(&splits)?);
        return Ok(());
    }

    println!(
        "{} codec={} splittable={} splits={}",
        path.display(),
        codec.name(),
        codec.is_splittable(),
        splits.len()
    );
    for s in &splits {
        let r = registry.adjusted_range(s)?;
        println!("  [{:>12}, {:>12})  adjusted [{}, {})", s.start, s.end(), r.start, r.end);
    }
    Ok(())
}

#[derive(Serialize)]
struct ScanReport<'a> {
    split: &'a Split,
    codec: &'static str,
    adjusted: AdjustedRange,
    pages: Vec<(u64, u64)>,
    counters: MetricsSnapshot,
}

/// Prescan one split and print its page boundaries.
pub fn cmd_scan(registry: &CodecRegistry, split: Split, cfg: &SplitConfig, json: bool) -> Result<()> {
    let metrics = Arc::new(AtomicMetrics::new());
    let mut reader = RecordReader::open(registry.clone(), split.clone(), metrics.clone(), cfg.clone())?;
    reader.init()?;

    let pages: Vec<(u64, u64)> = reader.boundaries().pages().collect();
    let report = ScanReport {
        split: &split,
        codec: reader.codec().name(),
        adjusted: reader.range(),
        pages,
        counters: metrics.snapshot(),
    };
    reader.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("split     = {}", report.split);
    println!("codec     = {}", report.codec);
    println!("adjusted  = [{}, {})", report.adjusted.start, report.adjusted.end);
    println!("pages     = {}", report.pages.len());
    if report.pages.is_empty() {
        println!("  (no complete pages)");
    }
    for (i, (b, e)) in report.pages.iter().enumerate() {
        println!("  #{:<6} begin={:<12} end={:<12} ({} B)", i, b, e, e - b);
    }
    Ok(())
}
