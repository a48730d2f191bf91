//! Worksheet Assembler: issues the BOF/DIMENSIONS/WINDOW2/SELECTION/
//! COLINFO/DEFCOLWIDTH/ROW/NUMBER/LABEL/BLANK/HLINK/FORMULA/EOF sequence
//! for one worksheet.

use crate::buffer::OctetBuffer;
use crate::error::{XlsError, XlsResult};
use crate::format::FormatDesc;
use crate::formula;
use crate::record::{self, fixed_payload, variable_payload};
use crate::records;
use crate::stream::StreamAccumulator;

const ROWMAX: u32 = 65536;
const COLMAX: u32 = 256;
const STRMAX: usize = 255;

/// The 40-byte `Hyperlink.clsMoniker`-shaped blob every plain absolute-URL
/// hyperlink record carries: `guidStdLink` followed by stream
/// version/flags/padding a reader ignores for this hyperlink kind.
const HLINK_UNKNOWN_BLOB: [u8; 40] = [
    0xD0, 0xC9, 0xEA, 0x79, 0xF9, 0xBA, 0xCE, 0x11, 0x8C, 0x82, 0x00, 0xAA, 0x00, 0x4B, 0xA9, 0x0B,
    0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0xE0, 0xC9, 0xEA, 0x79, 0xF9, 0xBA, 0xCE, 0x11,
    0x8C, 0x82, 0x00, 0xAA, 0x00, 0x4B, 0xA9, 0x0B,
];

/// A column-width span, recorded via [`Worksheet::set_column`] and emitted
/// as a COLINFO record at close.
struct ColInfo {
    first_col: u16,
    last_col: u16,
    width: u16,
    xf: u16,
}

/// One worksheet under construction. Owns its own [`StreamAccumulator`];
/// the workbook streams all worksheets' bytes after its own globals at
/// close time.
pub struct Worksheet {
    pub(crate) name: String,
    pub(crate) index: u16,
    /// Absolute byte offset of this sheet's BOF record within the final
    /// BIFF stream, computed by the workbook at close time for its
    /// BOUNDSHEET entry.
    pub(crate) offset: u32,
    acc: StreamAccumulator,

    activesheet: u16,

    dim_rowmin: u32,
    dim_rowmax: u32,
    dim_colmin: u32,
    dim_colmax: u32,

    sel_frow: u32,
    sel_fcol: u32,
    sel_lrow: u32,
    sel_lcol: u32,

    colinfos: Vec<ColInfo>,
    closed: bool,
}

impl Worksheet {
    pub(crate) fn new(name: String, index: u16, activesheet: u16, acc: StreamAccumulator) -> Self {
        Worksheet {
            name,
            index,
            offset: 0,
            acc,
            activesheet,
            dim_rowmin: ROWMAX + 1,
            dim_rowmax: 0,
            dim_colmin: ROWMAX + 1,
            dim_colmax: 0,
            sel_frow: 0,
            sel_fcol: 0,
            sel_lrow: 0,
            sel_lcol: 0,
            colinfos: Vec::new(),
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_bounds(&mut self, row: u32, col: u32) -> XlsResult<()> {
        if row >= ROWMAX || col >= COLMAX {
            return Err(XlsError::OutOfRange { row, col });
        }
        if row < self.dim_rowmin {
            self.dim_rowmin = row;
        }
        if row > self.dim_rowmax {
            self.dim_rowmax = row;
        }
        if col < self.dim_colmin {
            self.dim_colmin = col;
        }
        if col > self.dim_colmax {
            self.dim_colmax = col;
        }
        Ok(())
    }

    fn xf_of(fmt: Option<&FormatDesc>) -> u16 {
        fmt.map(|f| f.xf_index).unwrap_or(0x0F)
    }

    /// Writes an Excel NUMBER record. An integer can be written this way
    /// too — Excel will display it without a decimal point.
    pub fn write_number(&mut self, row: u32, col: u32, value: f64, fmt: Option<&FormatDesc>) -> XlsResult<()> {
        self.check_bounds(row, col)?;
        let xf = Self::xf_of(fmt);

        let mut p = fixed_payload(14);
        p.put_u16_le(row as u16);
        p.put_u16_le(col as u16);
        p.put_u16_le(xf);
        p.put_f64_host_le(value)?;
        record::append_record(&mut self.acc, records::NUMBER, &p)?;
        Ok(())
    }

    /// Writes an Excel LABEL record. Strings over 255 characters are
    /// truncated (policy, not an error — logged at `debug!`).
    pub fn write_string(&mut self, row: u32, col: u32, text: &str, fmt: Option<&FormatDesc>) -> XlsResult<()> {
        self.check_bounds(row, col)?;
        let xf = Self::xf_of(fmt);

        let truncated = if text.len() > STRMAX {
            log::debug!("worksheet {:?}: string at ({row},{col}) truncated to {STRMAX} bytes", self.name);
            &text[..STRMAX]
        } else {
            text
        };

        let mut p = variable_payload();
        p.put_u16_le(row as u16);
        p.put_u16_le(col as u16);
        p.put_u16_le(xf);
        p.put_u16_le(truncated.len() as u16);
        p.append(truncated.as_bytes());
        record::append_record(&mut self.acc, records::LABEL, &p)?;
        Ok(())
    }

    /// Writes an Excel BLANK record: a formatted cell with no value.
    pub fn write_blank(&mut self, row: u32, col: u32, fmt: Option<&FormatDesc>) -> XlsResult<()> {
        self.check_bounds(row, col)?;
        let xf = Self::xf_of(fmt);

        let mut p = fixed_payload(6);
        p.put_u16_le(row as u16);
        p.put_u16_le(col as u16);
        p.put_u16_le(xf);
        record::append_record(&mut self.acc, records::BLANK, &p)?;
        Ok(())
    }

    /// Writes a hyperlink: the visible label (via `write_string`, so the
    /// 255-character limit applies to it too) followed by the HLINK record
    /// carrying the target URL.
    pub fn write_url(&mut self, row: u32, col: u32, url: &str, label: Option<&str>, fmt: Option<&FormatDesc>) -> XlsResult<()> {
        let visible = label.unwrap_or(url);
        self.write_string(row, col, visible, fmt)?;

        let mut p = variable_payload();
        p.put_u16_le(row as u16);
        p.put_u16_le(row as u16);
        p.put_u16_le(col as u16);
        p.put_u16_le(col as u16);
        p.append(&HLINK_UNKNOWN_BLOB);
        p.put_u32_le(url.len() as u32);
        p.append(url.as_bytes());
        record::append_record(&mut self.acc, records::HLINK, &p)?;
        Ok(())
    }

    /// Compiles `formula` and writes it as an Excel FORMULA record. The
    /// result placeholder is left as zero bytes — this crate does not
    /// evaluate formulas, only compiles them to their Ptg byte stream.
    pub fn write_formula(&mut self, row: u32, col: u32, formula: &str, fmt: Option<&FormatDesc>) -> XlsResult<()> {
        self.check_bounds(row, col)?;
        let xf = Self::xf_of(fmt);
        let ptg = formula::compile(formula)?;

        let mut p = variable_payload();
        p.put_u16_le(row as u16);
        p.put_u16_le(col as u16);
        p.put_u16_le(xf);
        p.append_zeros(8); // result placeholder; never evaluated
        p.put_u16_le(0); // grbit
        p.put_u32_le(0); // chn: calc-chain pointer, unused by this writer
        p.put_u16_le(ptg.len() as u16);
        p.append(&ptg);
        record::append_record(&mut self.acc, records::FORMULA, &p)?;
        Ok(())
    }

    /// Records the selection rectangle to apply when the sheet closes.
    /// Coordinates need not already be ordered — the stored rectangle is
    /// normalised (first ≤ last on both axes) at close time.
    pub fn set_selection(&mut self, frow: u32, fcol: u32, lrow: u32, lcol: u32) {
        self.sel_frow = frow;
        self.sel_fcol = fcol;
        self.sel_lrow = lrow;
        self.sel_lcol = lcol;
    }

    /// Sets (or updates) the display width for a span of columns, emitted
    /// as a COLINFO record at close.
    pub fn set_column(&mut self, first_col: u32, last_col: u32, width: u16) {
        if let Some(ci) = self.colinfos.iter_mut().find(|ci| ci.first_col as u32 == first_col && ci.last_col as u32 == last_col) {
            ci.width = width;
            return;
        }
        self.colinfos.push(ColInfo {
            first_col: first_col as u16,
            last_col: last_col as u16,
            width,
            xf: 0x0F,
        });
    }

    /// Writes a ROW record setting the row's height (or `None` to leave
    /// height unset while still applying `fmt`) and/or format.
    pub fn set_row(&mut self, row: u32, height: Option<u16>, fmt: Option<&FormatDesc>) -> XlsResult<()> {
        let xf = Self::xf_of(fmt);
        let row_height = match height {
            Some(h) => h * 20,
            None => 0xFF,
        };

        let mut p = fixed_payload(16);
        p.put_u16_le(row as u16);
        p.put_u16_le(0x0000);
        p.put_u16_le(0x0000);
        p.put_u16_le(row_height);
        p.put_u16_le(0x0000);
        p.put_u16_le(0x0000);
        p.put_u16_le(0x01C0);
        p.put_u16_le(xf);
        record::append_record(&mut self.acc, records::ROW, &p)?;
        Ok(())
    }

    fn store_dimensions(&mut self) {
        let mut p = fixed_payload(10);
        p.put_u16_le(self.dim_rowmin as u16);
        p.put_u16_le(self.dim_rowmax as u16);
        p.put_u16_le(self.dim_colmin as u16);
        p.put_u16_le(self.dim_colmax as u16);
        p.put_u16_le(0x0000); // reserved
        record::prepend_record(&mut self.acc, records::DIMENSION, &p);
    }

    fn store_colinfo(&mut self, ci: &ColInfo) {
        // Excel subtracts 0.72 characters from the requested width and
        // stores the result in units of 1/256 of a character.
        let width_units = ((ci.width as f32 + 0.72) * 256.0) as u16;

        let mut p = fixed_payload(11);
        p.put_u16_le(ci.first_col);
        p.put_u16_le(ci.last_col);
        p.put_u16_le(width_units);
        p.put_u16_le(ci.xf);
        p.put_u16_le(0x0000); // option flags
        p.put_u8(0x00); // reserved
        record::prepend_record(&mut self.acc, records::COLINFO, &p);
    }

    fn store_defcolwidth(&mut self) {
        let mut p = fixed_payload(2);
        p.put_u16_le(0x0008);
        record::prepend_record(&mut self.acc, records::DEFCOLWIDTH, &p);
    }

    fn store_bof(&mut self) {
        let mut p = fixed_payload(8);
        p.put_u16_le(records::BIFF_VERSION);
        p.put_u16_le(records::BOF_WORKSHEET);
        p.put_u16_le(records::BIFF_BUILD);
        p.put_u16_le(records::BIFF_YEAR);
        record::prepend_record(&mut self.acc, records::BOF, &p);
    }

    fn store_window2(&mut self) -> std::io::Result<()> {
        let grbit: u16 = if self.activesheet == self.index { 0x06B6 } else { 0x00B6 };
        let mut p = fixed_payload(10);
        p.put_u16_le(grbit);
        p.put_u16_le(0x0000); // top row visible in window
        p.put_u16_le(0x0000); // leftmost column visible in window
        p.put_u32_le(0x00000000); // heading/gridline color
        record::append_record(&mut self.acc, records::WINDOW2, &p)
    }

    fn store_selection(&mut self) -> std::io::Result<()> {
        let (mut frow, mut lrow) = (self.sel_frow, self.sel_lrow);
        if frow > lrow {
            std::mem::swap(&mut frow, &mut lrow);
        }
        let (mut fcol, mut lcol) = (self.sel_fcol, self.sel_lcol);
        if fcol > lcol {
            std::mem::swap(&mut fcol, &mut lcol);
        }

        let mut p = fixed_payload(15);
        p.put_u8(3); // pane position
        p.put_u16_le(frow as u16); // active row
        p.put_u16_le(fcol as u16); // active column
        p.put_u16_le(0); // active cell ref index
        p.put_u16_le(1); // number of refs
        p.put_u16_le(frow as u16);
        p.put_u16_le(lrow as u16);
        p.put_u8(fcol as u8);
        p.put_u8(lcol as u8);
        record::append_record(&mut self.acc, records::SELECTION, &p)
    }

    /// Finalises this worksheet: prepends the header-style records
    /// (DIMENSIONS, COLINFO*, DEFCOLWIDTH, BOF) in reverse order, then
    /// appends WINDOW2, SELECTION, and EOF. Idempotent.
    pub(crate) fn close(&mut self) -> XlsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Prepend in reverse order: the last prepend call ends up first.
        self.store_dimensions();
        if !self.colinfos.is_empty() {
            let colinfos = std::mem::take(&mut self.colinfos);
            for ci in colinfos.iter().rev() {
                self.store_colinfo(ci);
            }
            self.colinfos = colinfos;
            self.store_defcolwidth();
        }
        self.store_bof();

        self.store_window2()?;
        self.store_selection()?;
        record::append_record(&mut self.acc, records::EOF, &fixed_payload(0))?;
        Ok(())
    }

    pub(crate) fn acc(&mut self) -> &mut StreamAccumulator {
        &mut self.acc
    }

    pub(crate) fn len(&self) -> usize {
        self.acc.len()
    }
}
