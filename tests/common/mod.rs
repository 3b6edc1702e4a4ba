#![allow(dead_code)]

use anyhow::{anyhow, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use wikisplit::{AtomicMetrics, CodecRegistry, LocalFs, RecordReader, Split, SplitConfig};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("wstest-{prefix}-{pid}-{t}-{id}"))
}

pub const PAGE_END_LEN: u64 = b"</page>".len() as u64;

#[derive(Clone, Debug)]
pub struct RevInfo {
    /// Offset of `<revision`.
    pub start: u64,
    pub id: u64,
}

#[derive(Clone, Debug)]
pub struct PageInfo {
    pub id: u64,
    /// Offset of `<page>`.
    pub begin: u64,
    /// Offset of `</page>`.
    pub end: u64,
    pub revisions: Vec<RevInfo>,
}

pub struct Dump {
    pub xml: Vec<u8>,
    pub pages: Vec<PageInfo>,
}

impl Dump {
    pub fn revision_count(&self) -> usize {
        self.pages.iter().map(|p| p.revisions.len()).sum()
    }

    pub fn all_revision_ids(&self) -> Vec<u64> {
        self.pages
            .iter()
            .flat_map(|p| p.revisions.iter().map(|r| r.id))
            .collect()
    }

    /// Offsets as the prescan reports them for a split starting at 0.
    pub fn boundary_offsets(&self) -> Vec<u64> {
        self.pages.iter().flat_map(|p| [p.begin, p.end]).collect()
    }

    /// Revision ids a sequence of splits is expected to emit, in order.
    ///
    /// `ranges` are the splits' `[start, end)` in stream coordinates. With
    /// `bounded` the stream ends at `end` (block codecs) so a page must close
    /// inside it; otherwise a `</page>` starting before `end` is enough.
    pub fn expected_ids(&self, ranges: &[(u64, u64)], bounded: bool) -> Vec<u64> {
        let mut out = Vec::new();
        for &(a, b) in ranges {
            let complete = |p: &PageInfo| {
                p.begin >= a
                    && if bounded {
                        p.end + PAGE_END_LEN <= b
                    } else {
                        p.end < b
                    }
            };
            if !self.pages.iter().any(complete) {
                continue;
            }
            for p in &self.pages {
                if complete(p) {
                    out.extend(p.revisions.iter().map(|r| r.id));
                } else if p.begin < a {
                    // хвост страницы, начатой до сплита
                    out.extend(p.revisions.iter().filter(|r| r.start >= a).map(|r| r.id));
                }
            }
        }
        out
    }
}

/// Dump with `pages` pages; page `i` (from 1) gets `revs(i)` revisions.
pub fn build_dump(pages: u64, revs: impl Fn(u64) -> u64) -> Dump {
    let mut xml = String::new();
    xml.push_str("<mediawiki xmlns=\"http://www.mediawiki.org/xml/export-0.10/\" xml:lang=\"en\">\n");
    xml.push_str("  <siteinfo>\n    <sitename>Wikipedia</sitename>\n    <base>https://en.wikipedia.org/wiki/Main_Page</base>\n  </siteinfo>\n");

    let mut infos = Vec::new();
    for i in 1..=pages {
        xml.push_str("  ");
        let begin = xml.len() as u64;
        xml.push_str(&format!(
            "<page>\n    <title>Page {i}</title>\n    <ns>0</ns>\n    <id>{i}</id>\n"
        ));
        let mut revisions = Vec::new();
        for r in 1..=revs(i) {
            let id = i * 1000 + r;
            xml.push_str("    ");
            revisions.push(RevInfo {
                start: xml.len() as u64,
                id,
            });
            xml.push_str(&format!(
                "<revision>\n      <id>{id}</id>\n      <timestamp>2001-01-{:02}T00:00:00Z</timestamp>\n      \
                 <contributor>\n        <username>user{r}</username>\n      </contributor>\n      \
                 <text xml:space=\"preserve\">Revision {r} of page {i} &amp; some [[link]] text</text>\n    \
                 </revision>\n",
                (r % 28) + 1
            ));
        }
        xml.push_str("  ");
        let end = xml.len() as u64;
        xml.push_str("</page>\n");
        infos.push(PageInfo {
            id: i,
            begin,
            end,
            revisions,
        });
    }
    xml.push_str("</mediawiki>\n");

    Dump {
        xml: xml.into_bytes(),
        pages: infos,
    }
}

/// The three-page, two-revisions-per-page dump used throughout.
pub fn small_dump() -> Dump {
    build_dump(3, |_| 2)
}

#[derive(Debug, Default)]
pub struct ParsedRecord {
    pub page_id: Option<u64>,
    /// Ids of the `<revision>` elements in document order (`None` for the placeholder).
    pub revision_ids: Vec<Option<u64>>,
    pub placeholder: bool,
}

impl ParsedRecord {
    pub fn emitted_id(&self) -> Result<u64> {
        self.revision_ids
            .get(1)
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("record has no second revision id"))
    }
}

/// Parse one record with quick-xml and check its shape: one `<page>`, two
/// `<revision>` elements, balanced tags.
pub fn parse_record(rec: &[u8]) -> Result<ParsedRecord> {
    let mut reader = Reader::from_reader(rec);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut pages = 0usize;
    let mut out = ParsedRecord::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if name == b"page" {
                    pages += 1;
                }
                if name == b"revision" {
                    out.revision_ids.push(None);
                    if e.attributes().flatten().any(|a| a.key.as_ref() == b"beginningofpage") {
                        out.placeholder = true;
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"revision" {
                    out.revision_ids.push(None);
                }
            }
            Event::End(e) => {
                let top = stack.pop().ok_or_else(|| anyhow!("unbalanced end tag"))?;
                if top.as_slice() != e.name().as_ref() {
                    return Err(anyhow!("mismatched end tag"));
                }
            }
            Event::Text(t) => {
                let n = stack.len();
                if n >= 2 && stack[n - 1] == b"id" {
                    let v: u64 = t.unescape()?.trim().parse()?;
                    if stack[n - 2] == b"revision" {
                        if let Some(last) = out.revision_ids.last_mut() {
                            *last = Some(v);
                        }
                    } else if stack[n - 2] == b"page" {
                        out.page_id = Some(v);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(anyhow!("unclosed elements: {}", stack.len()));
    }
    if pages != 1 {
        return Err(anyhow!("expected one <page>, got {}", pages));
    }
    if out.revision_ids.len() != 2 {
        return Err(anyhow!("expected two <revision>, got {}", out.revision_ids.len()));
    }
    Ok(out)
}

/// Number of `<revision>` elements in a whole document.
pub fn reference_revision_count(xml: &[u8]) -> Result<usize> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut n = 0usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"revision" => n += 1,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(n)
}

pub fn local_registry() -> CodecRegistry {
    CodecRegistry::new(Arc::new(LocalFs))
}

/// Small buffers so chunk edges land inside markers.
pub fn test_config() -> SplitConfig {
    SplitConfig::default().with_read_buffer_bytes(64)
}

/// Drain one split, returning its records.
pub fn read_split(
    registry: &CodecRegistry,
    split: Split,
    metrics: Arc<AtomicMetrics>,
    cfg: &SplitConfig,
) -> Result<Vec<Vec<u8>>> {
    let mut reader = RecordReader::open(registry.clone(), split, metrics, cfg.clone())?;
    let mut out = Vec::new();
    for rec in reader.records() {
        out.push(rec?);
    }
    reader.close();
    Ok(out)
}

pub fn emitted_ids(records: &[Vec<u8>]) -> Result<Vec<u64>> {
    records
        .iter()
        .map(|r| parse_record(r).and_then(|p| p.emitted_id()))
        .collect()
}
