//! BIFF record type constants and the few fixed header fields this writer emits.
//!
//! Reference: [MS-XLS] §2.3 — Record Enumeration. Only the records this
//! crate's writer actually emits are listed; there is no reader here to
//! justify carrying the rest of the enumeration.

// ── Stream structure ────────────────────────────────────────────────────
pub const BOF: u16 = 0x0809;
pub const EOF: u16 = 0x000A;

// ── Workbook globals ────────────────────────────────────────────────────
pub const BOUNDSHEET: u16 = 0x0085;
pub const DATEMODE: u16 = 0x0022;
pub const CODEPAGE: u16 = 0x0042;
pub const WINDOW1: u16 = 0x003D;
pub const FONT: u16 = 0x0031;
pub const FORMAT: u16 = 0x041E;
pub const XF: u16 = 0x00E0;
pub const STYLE: u16 = 0x0293;

// ── Cell records ────────────────────────────────────────────────────────
pub const DIMENSION: u16 = 0x0200;
pub const LABEL: u16 = 0x0204;
pub const NUMBER: u16 = 0x0203;
pub const BLANK: u16 = 0x0201;
pub const FORMULA: u16 = 0x0006;

// ── Sheet structure ─────────────────────────────────────────────────────
pub const COLINFO: u16 = 0x007D;
pub const DEFCOLWIDTH: u16 = 0x0055;
pub const WINDOW2: u16 = 0x023E;
pub const SELECTION: u16 = 0x001D;
pub const HLINK: u16 = 0x01B8;
pub const ROW: u16 = 0x0208;

// ── BOF subtypes (the `dt` field) ───────────────────────────────────────
pub const BOF_WORKBOOK_GLOBALS: u16 = 0x0005;
pub const BOF_WORKSHEET: u16 = 0x0010;

/// BIFF version field written in every BOF record.
pub const BIFF_VERSION: u16 = 0x0500;
/// Build identifier written in every BOF record.
pub const BIFF_BUILD: u16 = 0x096C;
/// Build year written in every BOF record.
pub const BIFF_YEAR: u16 = 0x07C9;
