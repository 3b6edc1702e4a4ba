use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::config::SplitConfig;
use crate::split::Split;
use crate::storage::LocalFs;

mod extract;
mod pack;
mod scan;

#[derive(Parser, Debug)]
#[command(
    name = "wikisplit",
    version,
    about = "Split-aware page/revision record reader for XML dumps",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Show the splits the planner would hand out for a file
    Splits {
        #[arg(long)]
        path: PathBuf,
        /// Raw split length (default: WS_SPLIT_BYTES or 64 MiB)
        #[arg(long)]
        split_bytes: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Prescan one split and print its page boundaries
    Scan {
        #[arg(long)]
        path: PathBuf,
        /// Split start (default 0)
        #[arg(long)]
        start: Option<u64>,
        /// Split length (default: to end of file)
        #[arg(long)]
        length: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Emit records of one split (with --start) or of every planned split
    Extract {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        start: Option<u64>,
        #[arg(long)]
        length: Option<u64>,
        #[arg(long)]
        split_bytes: Option<u64>,
        /// Write records here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// One JSON object per record instead of raw XML fragments
        #[arg(long)]
        jsonl: bool,
    },
    /// Re-compress a file as seekable zstd (splittable)
    Pack {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        frame_bytes: Option<usize>,
        #[arg(long)]
        level: Option<i32>,
        /// Store xxh64 checksums per frame
        #[arg(long)]
        checksums: bool,
    },
}

fn registry() -> CodecRegistry {
    CodecRegistry::new(Arc::new(LocalFs))
}

/// Single split from CLI flags: `[start, start + length)`, clamped to the file.
fn split_from_args(
    registry: &CodecRegistry,
    path: &Path,
    start: Option<u64>,
    length: Option<u64>,
) -> Result<Split> {
    let len = registry.storage().len(path)?;
    let start = start.unwrap_or(0);
    if start > len {
        return Err(anyhow!(
            "split start {} is past end of {} ({} B)",
            start,
            path.display(),
            len
        ));
    }
    let length = length.unwrap_or(len - start).min(len - start);
    Ok(Split::new(path, start, length))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = SplitConfig::from_env();
    log::debug!("{}", cfg);

    match cli.cmd {
        Cmd::Splits {
            path,
            split_bytes,
            json,
        } => {
            let cfg = match split_bytes {
                Some(n) => cfg.with_split_bytes(n),
                None => cfg,
            };
            scan::cmd_splits(&registry(), &path, &cfg, json)
        }
        Cmd::Scan {
            path,
            start,
            length,
            json,
        } => {
            let reg = registry();
            let split = split_from_args(&reg, &path, start, length)?;
            scan::cmd_scan(&reg, split, &cfg, json)
        }
        Cmd::Extract {
            path,
            start,
            length,
            split_bytes,
            out,
            jsonl,
        } => {
            let cfg = match split_bytes {
                Some(n) => cfg.with_split_bytes(n),
                None => cfg,
            };
            let reg = registry();
            let single = match start {
                Some(_) => Some(split_from_args(&reg, &path, start, length)?),
                None => None,
            };
            extract::cmd_extract(&reg, &path, single, &cfg, out, jsonl)
        }
        Cmd::Pack {
            input,
            out,
            frame_bytes,
            level,
            checksums,
        } => {
            let mut cfg = cfg;
            if let Some(n) = frame_bytes {
                cfg = cfg.with_frame_bytes(n);
            }
            if let Some(l) = level {
                cfg = cfg.with_zstd_level(l);
            }
            pack::cmd_pack(&input, &out, &cfg, checksums)
        }
    }
}
