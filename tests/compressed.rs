mod common;

use anyhow::{anyhow, Result};
use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use common::*;
use wikisplit::codec::{write_seekable, SeekTable};
use wikisplit::driver::{plan_splits, run_file};
use wikisplit::storage::{SeekRead, Storage};
use wikisplit::{AtomicMetrics, Codec, LocalFs, RecordReader, Split};

fn write_gzip(path: &Path, data: &[u8]) -> Result<()> {
    let mut enc = GzEncoder::new(File::create(path)?, Compression::default());
    enc.write_all(data)?;
    enc.finish()?;
    Ok(())
}

fn write_bzip2(path: &Path, data: &[u8]) -> Result<()> {
    let mut enc = BzEncoder::new(File::create(path)?, bzip2::Compression::default());
    enc.write_all(data)?;
    enc.finish()?;
    Ok(())
}

fn write_seekable_file(path: &Path, data: &[u8], frame: usize, checksums: bool) -> Result<SeekTable> {
    let f = File::create(path)?;
    write_seekable(data, f, frame, 3, checksums)
}

fn read_table(path: &Path) -> Result<SeekTable> {
    let len = LocalFs.len(path)?;
    let mut src: Box<dyn SeekRead> = LocalFs.open(path)?;
    SeekTable::read_from(src.as_mut(), len)?.ok_or_else(|| anyhow!("no seek table"))
}

#[test]
fn codec_follows_path_and_footer() -> Result<()> {
    let root = unique_root("codecs");
    fs::create_dir_all(&root)?;
    let dump = small_dump();

    let plain = root.join("dump.xml");
    let gz = root.join("dump.xml.gz");
    let bz = root.join("dump.xml.bz2");
    let zst = root.join("dump.xml.zst");
    let seek = root.join("dump-seekable.xml.zst");
    fs::write(&plain, &dump.xml)?;
    write_gzip(&gz, &dump.xml)?;
    write_bzip2(&bz, &dump.xml)?;
    fs::write(&zst, zstd::encode_all(dump.xml.as_slice(), 3)?)?;
    write_seekable_file(&seek, &dump.xml, 256, false)?;

    let registry = local_registry();
    assert_eq!(registry.codec_for(&plain)?, Codec::None);
    assert_eq!(registry.codec_for(&gz)?, Codec::Gzip);
    assert_eq!(registry.codec_for(&bz)?, Codec::Bzip2);
    assert_eq!(registry.codec_for(&zst)?, Codec::Zstd);
    assert_eq!(registry.codec_for(&seek)?, Codec::SeekableZstd);

    assert!(registry.is_splittable(&plain)?);
    assert!(!registry.is_splittable(&gz)?);
    assert!(!registry.is_splittable(&bz)?);
    assert!(!registry.is_splittable(&zst)?);
    assert!(registry.is_splittable(&seek)?);

    // Несплиттуемые кодеки: один сплит на весь файл.
    for p in [&gz, &bz, &zst] {
        let splits = plan_splits(&registry, p, 16)?;
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].start, 0);
        assert_eq!(splits[0].length, fs::metadata(p)?.len());
    }
    Ok(())
}

#[test]
fn whole_file_codecs_read_every_revision() -> Result<()> {
    let root = unique_root("whole-codecs");
    fs::create_dir_all(&root)?;
    let dump = build_dump(20, |i| 1 + i % 3);

    let gz = root.join("dump.xml.gz");
    let bz = root.join("dump.xml.bz2");
    let zst = root.join("dump.xml.zst");
    write_gzip(&gz, &dump.xml)?;
    write_bzip2(&bz, &dump.xml)?;
    fs::write(&zst, zstd::encode_all(dump.xml.as_slice(), 3)?)?;

    let registry = local_registry();
    for path in [&gz, &bz, &zst] {
        let len = fs::metadata(path)?.len();
        let metrics = Arc::new(AtomicMetrics::new());
        let mut reader = RecordReader::open(
            registry.clone(),
            Split::new(path, 0, len),
            metrics.clone(),
            test_config(),
        )?;
        let mut recs = Vec::new();
        for rec in reader.records() {
            recs.push(rec?);
        }
        assert!(reader.progress() > 0.0);
        assert!(reader.progress() <= 1.0);
        reader.close();

        assert_eq!(emitted_ids(&recs)?, dump.all_revision_ids(), "{}", path.display());
        assert_eq!(metrics.snapshot().found_pages, 20);
        // Смещения считаются в распакованных байтах.
        assert_eq!(reader.boundaries().as_slice(), dump.boundary_offsets().as_slice());
    }
    Ok(())
}

#[test]
fn non_splittable_codec_rejects_mid_file_split() -> Result<()> {
    let root = unique_root("gz-mid");
    fs::create_dir_all(&root)?;
    let dump = small_dump();
    let gz = root.join("dump.xml.gz");
    write_gzip(&gz, &dump.xml)?;
    let len = fs::metadata(&gz)?.len();

    let mut reader = RecordReader::open(
        local_registry(),
        Split::new(&gz, len / 2, len - len / 2),
        Arc::new(AtomicMetrics::new()),
        test_config(),
    )?;
    let mut key = Vec::new();
    let mut value = Vec::new();
    let err = reader
        .produce_next(&mut key, &mut value)
        .expect_err("gzip split must start at 0");
    assert!(err.to_string().contains("not splittable"), "{err}");
    Ok(())
}

#[test]
fn bzip2_streams_are_concatenated() -> Result<()> {
    let root = unique_root("bz2-multi");
    fs::create_dir_all(&root)?;
    let dump = build_dump(6, |_| 2);
    let half = dump.pages[3].begin as usize;

    // Два bzip2-потока подряд, как в многопоточных дампах.
    let path = root.join("multi.xml.bz2");
    let first = root.join("a.bz2");
    let second = root.join("b.bz2");
    write_bzip2(&first, &dump.xml[..half])?;
    write_bzip2(&second, &dump.xml[half..])?;
    let mut bytes = fs::read(&first)?;
    bytes.extend(fs::read(&second)?);
    fs::write(&path, &bytes)?;

    let metrics = Arc::new(AtomicMetrics::new());
    let recs = read_split(
        &local_registry(),
        Split::new(&path, 0, bytes.len() as u64),
        metrics.clone(),
        &test_config(),
    )?;
    assert_eq!(emitted_ids(&recs)?, dump.all_revision_ids());
    assert_eq!(metrics.snapshot().found_pages, 6);

    let err = read_split(
        &local_registry(),
        Split::new(&path, 10, bytes.len() as u64 - 10),
        Arc::new(AtomicMetrics::new()),
        &test_config(),
    )
    .expect_err("bzip2 split must start at 0");
    assert!(err.to_string().contains("bzip2-compressed"), "{err}");
    Ok(())
}

#[test]
fn seekable_zstd_single_split_matches_plain() -> Result<()> {
    let root = unique_root("seekable-one");
    fs::create_dir_all(&root)?;
    let dump = build_dump(15, |i| 1 + i % 4);
    let path = root.join("dump.xml.zst");
    let table = write_seekable_file(&path, &dump.xml, 512, true)?;
    assert!(table.frames.len() > 1);
    assert_eq!(table.decompressed_len(), dump.xml.len() as u64);

    let len = fs::metadata(&path)?.len();
    let recs = read_split(
        &local_registry(),
        Split::new(&path, 0, len),
        Arc::new(AtomicMetrics::new()),
        &test_config(),
    )?;
    assert_eq!(emitted_ids(&recs)?, dump.all_revision_ids());
    for r in &recs {
        parse_record(r)?;
    }
    Ok(())
}

#[test]
fn seekable_zstd_splits_snap_to_frames() -> Result<()> {
    let root = unique_root("seekable-many");
    fs::create_dir_all(&root)?;
    let dump = build_dump(25, |i| 1 + i % 3);
    let path = root.join("dump.xml.zst");

    for frame in [300usize, 1024, 4096] {
        write_seekable_file(&path, &dump.xml, frame, false)?;
        let table = read_table(&path)?;
        let registry = local_registry();
        let len = fs::metadata(&path)?.len();

        for split_bytes in [len / 3 + 1, 200, 97] {
            let splits = plan_splits(&registry, &path, split_bytes)?;

            // Распакованные диапазоны, которые получает каждый сплит.
            let mut ranges = Vec::new();
            for s in &splits {
                let (frames, adj) = table.snap(s.start, s.end());
                assert_eq!(registry.adjusted_range(s)?, adj);
                let first = match frames.first() {
                    Some(f) => f.offset,
                    None => continue,
                };
                let before: u64 = table
                    .frames
                    .iter()
                    .take_while(|f| f.offset < first)
                    .map(|f| f.decompressed as u64)
                    .sum();
                let size: u64 = frames.iter().map(|f| f.decompressed as u64).sum();
                ranges.push((before, before + size));
            }
            for w in ranges.windows(2) {
                assert_eq!(w[0].1, w[1].0, "frames are partitioned between splits");
            }

            let cfg = test_config().with_split_bytes(split_bytes);
            let mut recs = Vec::new();
            run_file(&registry, &path, Arc::new(AtomicMetrics::new()), &cfg, |_, rec| {
                recs.push(rec.to_vec());
                Ok(())
            })?;
            assert_eq!(
                emitted_ids(&recs)?,
                dump.expected_ids(&ranges, true),
                "frame={frame} split_bytes={split_bytes}"
            );
        }
    }
    Ok(())
}

#[test]
fn corrupted_frame_checksum_is_an_error() -> Result<()> {
    let root = unique_root("seekable-bad");
    fs::create_dir_all(&root)?;
    let dump = small_dump();
    let path = root.join("dump.xml.zst");
    let table = write_seekable_file(&path, &dump.xml, 256, true)?;

    // Подменяем контрольную сумму первого кадра в таблице.
    let mut bytes = fs::read(&path)?;
    let entry_at = table.data_end() as usize + 8 + 8;
    bytes[entry_at] ^= 0xFF;
    fs::write(&path, &bytes)?;

    let len = bytes.len() as u64;
    let res = read_split(
        &local_registry(),
        Split::new(&path, 0, len),
        Arc::new(AtomicMetrics::new()),
        &test_config(),
    );
    let err = res.expect_err("checksum mismatch must surface");
    assert!(format!("{err:?}").contains("checksum"), "{err:?}");
    Ok(())
}
