use anyhow::{Context, Result};
use log::info;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::config::SplitConfig;
use crate::driver::{plan_splits, run_split};
use crate::metrics::AtomicMetrics;
use crate::reader::RecordReader;
use crate::split::Split;

pub fn cmd_extract(
    registry: &CodecRegistry,
    path: &Path,
    single: Option<Split>,
    cfg: &SplitConfig,
    out: Option<PathBuf>,
    jsonl: bool,
) -> Result<()> {
    let sink: Box<dyn Write> = match &out {
        Some(p) => Box::new(
            OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(p)
                .with_context(|| format!("open out {}", p.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut w = BufWriter::new(sink);

    let splits = match single {
        Some(s) => vec![s],
        None => plan_splits(registry, path, cfg.split_bytes)?,
    };

    let metrics = Arc::new(AtomicMetrics::new());
    let mut total = 0u64;
    for (si, split) in splits.iter().enumerate() {
        let mut reader =
            RecordReader::open(registry.clone(), split.clone(), metrics.clone(), cfg.clone())?;
        let mut index = 0u64;
        let n = run_split(&mut reader, |rec| {
            if jsonl {
                let line = serde_json::json!({
                    "split": si,
                    "index": index,
                    "record": String::from_utf8_lossy(rec),
                });
                writeln!(w, "{}", line)?;
            } else {
                w.write_all(rec)?;
            }
            index += 1;
            Ok(())
        })?;
        info!("split {} ({}): {} record(s)", si, split, n);
        total += n;
    }
    w.flush()?;

    let s = metrics.snapshot();
    info!(
        "extracted {} record(s) from {} split(s): {}",
        total,
        splits.len(),
        s.summary()
    );
    if let Some(p) = out {
        eprintln!("Wrote {} record(s) to {}", total, p.display());
    }
    Ok(())
}
