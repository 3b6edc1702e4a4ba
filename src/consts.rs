//! Literal markers and synthetic fragments shared by the scanner and the reader.

// -------- Structural markers --------
pub const PAGE_BEGIN: &[u8] = b"<page>";
pub const PAGE_END: &[u8] = b"</page>";
// Без '>': у ревизии могут быть атрибуты.
pub const REVISION_BEGIN: &[u8] = b"<revision";
pub const REVISION_END: &[u8] = b"</revision>";

// -------- Synthetic record pieces --------
/// Stand-in for the "previous revision" of the first revision of a page.
/// Follows a literal `<revision` marker.
pub const FIRST_REVISION_PLACEHOLDER: &[u8] = b" beginningofpage=\"true\"></revision>\n";
pub const PAGE_FOOTER: &[u8] = b"</page>\n";
/// Header used for revisions read before the first page discovered in a split
/// (the split starts inside a page whose `<page>` lies in an earlier split).
pub const ORPHAN_PAGE_HEADER: &[u8] = b"<page>\n";

// -------- Seekable zstd (block-splittable codec) --------
pub const SKIPPABLE_FRAME_MAGIC: u32 = 0x184D_2A5E;
pub const SEEKABLE_MAGIC: u32 = 0x8F92_EAB1;
pub const SEEK_TABLE_FOOTER_SIZE: usize = 9; // [frames u32][descriptor u8][magic u32]
pub const SEEK_TABLE_CHECKSUM_FLAG: u8 = 0x80;
pub const SKIPPABLE_HDR_SIZE: usize = 8; // [magic u32][frame_size u32]
// Формат ограничивает размеры кадра u32.
pub const MAX_FRAME_BYTES: usize = 0x4000_0000;

// -------- Defaults --------
pub const DEFAULT_READ_BUFFER_BYTES: usize = 1024 * 1024;
pub const DEFAULT_SPLIT_BYTES: u64 = 64 * 1024 * 1024;
pub const DEFAULT_FRAME_BYTES: usize = 1024 * 1024;
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;
