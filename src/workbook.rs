//! Workbook Assembler: owns every worksheet and format in the document,
//! builds the global BIFF substream at close, and streams everything
//! through the OLE2 container into a [`Sink`].

use std::path::{Path, PathBuf};

use crate::error::{XlsError, XlsResult};
use crate::format::{FormatDesc, FormatRegistry};
use crate::ole2;
use crate::record::{fixed_payload, variable_payload};
use crate::records;
use crate::sink::{FileSink, Sink};
use crate::stream::StreamAccumulator;
use crate::worksheet::Worksheet;

/// Byte length a BOUNDSHEET record's header+fixed fields contribute,
/// excluding the sheet name — used by [`Workbook::calc_sheet_offsets`].
const BOUNDSHEET_FIXED_LEN: u32 = 11;
/// Byte length of the global EOF record.
const EOF_LEN: u32 = 4;

/// Maximum worksheet name length; names longer than this are truncated.
const MAX_SHEET_NAME_LEN: usize = 31;

/// A handle into [`Workbook::formats`], returned by [`Workbook::add_format`]
/// so callers can look the format back up to keep configuring it.
pub type FormatId = usize;

/// An Excel workbook under construction: a global substream plus an
/// ordered list of worksheets and formats.
pub struct Workbook {
    global: StreamAccumulator,
    worksheets: Vec<Worksheet>,
    formats: Vec<FormatDesc>,
    registry: FormatRegistry,
    url_format: Option<FormatId>,

    activesheet: u16,
    firstsheet: u16,
    next_xf_index: u16,
    codepage: u16,
    epoch1904: bool,

    scratch_dir: Option<PathBuf>,
    closed: bool,
}

/// The cell XF index assigned to the first fifteen style XFs plus the
/// blank default cell XF, mirroring [`crate::format::FormatRegistry`]'s
/// built-in count: user formats start one past it.
const FIRST_USER_XF_INDEX: u16 = 16;

impl Workbook {
    /// Creates a workbook whose worksheet bodies are accumulated entirely
    /// in memory. Suitable for small-to-medium workbooks; large ones
    /// should use [`Workbook::with_scratch_dir`] instead.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a workbook whose worksheet bodies spill to scratch files
    /// under `dir` once they start accumulating, rather than staying
    /// resident in memory for the whole construction.
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self::build(Some(dir.into()))
    }

    fn build(scratch_dir: Option<PathBuf>) -> Self {
        Workbook {
            global: StreamAccumulator::new_in_memory(),
            worksheets: Vec::new(),
            formats: Vec::new(),
            registry: FormatRegistry::new(),
            url_format: None,
            activesheet: 0,
            firstsheet: 0,
            next_xf_index: FIRST_USER_XF_INDEX,
            codepage: 0x04E4,
            epoch1904: false,
            scratch_dir,
            closed: false,
        }
    }

    /// Sets the date system: `false` for the 1900 epoch (the default),
    /// `true` for the 1904 epoch.
    pub fn set_1904(&mut self, epoch1904: bool) -> &mut Self {
        self.epoch1904 = epoch1904;
        self
    }

    /// Sets the codepage written in the CODEPAGE record. Defaults to
    /// `0x04E4` (Windows-1252).
    pub fn set_codepage(&mut self, codepage: u16) -> &mut Self {
        self.codepage = codepage;
        self
    }

    /// The default hyperlink format (blue foreground, underlined),
    /// created on first use and memoized thereafter. Pass
    /// `Some(workbook.format(id))` to [`Worksheet::write_url`] to apply it.
    pub fn url_format(&mut self) -> FormatId {
        if let Some(id) = self.url_format {
            return id;
        }
        let id = self.add_format();
        self.format_mut(id).set_fg_color("blue").set_underline(1);
        self.url_format = Some(id);
        id
    }

    /// Adds a new worksheet, auto-naming it `Sheet<N>` (1-based) if
    /// `name` is `None`; names longer than 31 characters are truncated.
    pub fn add_worksheet(&mut self, name: Option<&str>) -> &mut Worksheet {
        let index = self.worksheets.len() as u16;
        let mut name = name.map(|s| s.to_string()).unwrap_or_else(|| format!("Sheet{}", index + 1));
        if name.len() > MAX_SHEET_NAME_LEN {
            name.truncate(MAX_SHEET_NAME_LEN);
        }

        let acc = match &self.scratch_dir {
            Some(dir) => StreamAccumulator::new_scratch(Some(dir.as_path())).expect("scratch directory must be writable"),
            None => StreamAccumulator::new_in_memory(),
        };
        let ws = Worksheet::new(name, index, self.activesheet, acc);
        self.worksheets.push(ws);
        self.worksheets.last_mut().unwrap()
    }

    /// Returns the worksheet at `index`, if one exists.
    pub fn worksheet(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Adds a new cell format and returns a handle to it; the handle's
    /// XF index is assigned immediately, independent of font/number-format
    /// deduplication (which only happens at [`Workbook::close`]).
    pub fn add_format(&mut self) -> FormatId {
        let mut fmt = FormatDesc::new();
        fmt.xf_index = self.next_xf_index;
        self.next_xf_index += 1;
        self.formats.push(fmt);
        self.formats.len() - 1
    }

    /// Returns the format for `id`, for chaining setter calls.
    pub fn format_mut(&mut self, id: FormatId) -> &mut FormatDesc {
        &mut self.formats[id]
    }

    /// Returns the format for `id`, e.g. to pass to `write_number`/`write_string`.
    pub fn format(&self, id: FormatId) -> &FormatDesc {
        &self.formats[id]
    }

    fn store_bof_globals(&mut self) -> std::io::Result<()> {
        let mut p = fixed_payload(8);
        p.put_u16_le(records::BIFF_VERSION);
        p.put_u16_le(records::BOF_WORKBOOK_GLOBALS);
        p.put_u16_le(records::BIFF_BUILD);
        p.put_u16_le(records::BIFF_YEAR);
        crate::record::append_record(&mut self.global, records::BOF, &p)
    }

    fn store_codepage(&mut self) -> std::io::Result<()> {
        let mut p = fixed_payload(2);
        p.put_u16_le(self.codepage);
        crate::record::append_record(&mut self.global, records::CODEPAGE, &p)
    }

    fn store_window1(&mut self) -> std::io::Result<()> {
        let mut p = fixed_payload(18);
        p.put_u16_le(0x0000); // horizontal position of window
        p.put_u16_le(0x0069); // vertical position of window
        p.put_u16_le(0x339F); // width of window
        p.put_u16_le(0x5D1B); // height of window
        p.put_u16_le(0x0038); // option flags
        p.put_u16_le(self.activesheet);
        p.put_u16_le(self.firstsheet);
        p.put_u16_le(0x0001); // number of workbook tabs selected
        p.put_u16_le(0x0258); // tab-to-scrollbar ratio
        crate::record::append_record(&mut self.global, records::WINDOW1, &p)
    }

    fn store_1904(&mut self) -> std::io::Result<()> {
        let mut p = fixed_payload(2);
        p.put_u16_le(self.epoch1904 as u16);
        crate::record::append_record(&mut self.global, records::DATEMODE, &p)
    }

    fn store_style(&mut self) -> std::io::Result<()> {
        let mut p = fixed_payload(4);
        p.put_u16_le(0x0000); // index to style XF
        p.put_u8(0x00); // built-in style
        p.put_u8(0x00); // outline style level
        crate::record::append_record(&mut self.global, records::STYLE, &p)
    }

    fn store_boundsheet(&mut self, name: &str, offset: u32) -> std::io::Result<()> {
        let mut p = variable_payload();
        p.put_u32_le(offset);
        p.put_u16_le(0x0000); // sheet identifier / visibility+type
        p.put_u8(name.len() as u8);
        p.append(name.as_bytes());
        crate::record::append_record(&mut self.global, records::BOUNDSHEET, &p)
    }

    /// Computes each worksheet's BOF offset within the final BIFF stream,
    /// and the resulting total `biffsize`.
    fn calc_sheet_offsets(&mut self) -> u32 {
        let mut offset = self.global.len() as u32;
        for ws in &self.worksheets {
            offset += BOUNDSHEET_FIXED_LEN + ws.name.len() as u32;
        }
        offset += EOF_LEN;

        for ws in &mut self.worksheets {
            ws.offset = offset;
            offset += ws.len() as u32;
        }
        offset
    }

    /// Finalises every worksheet and the global substream, then streams
    /// the complete workbook through the OLE2 container into `sink`.
    /// Idempotent: a second call is a no-op.
    pub fn close(&mut self, sink: &mut dyn Sink) -> XlsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        for ws in &mut self.worksheets {
            ws.close()?;
        }

        self.store_bof_globals()?;
        self.store_codepage()?;
        self.store_window1()?;
        self.store_1904()?;

        let mut formats = std::mem::take(&mut self.formats);
        for fmt in &mut formats {
            self.registry.resolve(fmt);
        }
        self.registry.emit_fonts(&mut self.global)?;
        self.registry.emit_num_formats(&mut self.global)?;
        self.registry.emit_xfs(&formats, &mut self.global)?;
        self.formats = formats;

        self.store_style()?;

        let biffsize = self.calc_sheet_offsets();

        let names: Vec<(String, u32)> = self.worksheets.iter().map(|ws| (ws.name.clone(), ws.offset)).collect();
        for (name, offset) in names {
            self.store_boundsheet(&name, offset)?;
        }

        crate::record::append_record(&mut self.global, records::EOF, &fixed_payload(0))?;

        debug_assert_eq!(
            self.global.len() as u32 + self.worksheets.iter().map(|ws| ws.len() as u32).sum::<u32>(),
            biffsize,
            "sheet offsets must be computed from the final global+per-sheet byte counts"
        );

        let global = &mut self.global;
        let worksheets = &mut self.worksheets;
        ole2::write_container(sink, biffsize as usize, |emit| {
            global.drain_into(|b| emit(b))?;
            for ws in worksheets.iter_mut() {
                ws.acc().drain_into(|b| emit(b))?;
            }
            Ok(())
        })
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper: creates a workbook, opens `path` as a [`FileSink`],
/// and returns both so the caller can build the document and then call
/// [`Workbook::close`].
pub fn create(path: impl AsRef<Path>) -> XlsResult<(Workbook, FileSink)> {
    let sink = FileSink::create(path).map_err(XlsError::SinkIOError)?;
    Ok((Workbook::new(), sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn url_format_is_blue_and_underlined_and_created_lazily() {
        let mut wb = Workbook::new();
        assert_eq!(wb.formats.len(), 0, "url format must not be created until first requested");
        let id = wb.url_format();
        let fmt = wb.format(id);
        assert_eq!(fmt.fg_color, 0x0C); // "blue"
        assert_eq!(fmt.underline, 1);
    }

    #[test]
    fn add_format_assigns_sequential_xf_indices_starting_at_16() {
        let mut wb = Workbook::new();
        let a = wb.add_format();
        let b = wb.add_format();
        assert_eq!(wb.format(a).xf_index, FIRST_USER_XF_INDEX);
        assert_eq!(wb.format(b).xf_index, FIRST_USER_XF_INDEX + 1);
    }

    #[test]
    fn add_worksheet_auto_names_sequentially() {
        let mut wb = Workbook::new();
        wb.add_worksheet(None);
        wb.add_worksheet(None);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Sheet1");
        assert_eq!(wb.worksheet(1).unwrap().name(), "Sheet2");
    }

    #[test]
    fn worksheet_name_longer_than_31_chars_is_truncated() {
        let mut wb = Workbook::new();
        let long_name = "x".repeat(50);
        wb.add_worksheet(Some(&long_name));
        assert_eq!(wb.worksheet(0).unwrap().name().len(), 31);
    }

    #[test]
    fn s1_number_write_close_produces_ole_header_and_number_record() {
        let mut wb = Workbook::new();
        wb.add_worksheet(Some("Sheet1"));
        wb.worksheet(0).unwrap().write_number(0, 0, 42.0, None).unwrap();

        let mut sink = MemorySink::new();
        wb.close(&mut sink).unwrap();

        assert_eq!(&sink.buf[0..8], &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
        let pos = sink.buf.windows(2).position(|w| w == records::NUMBER.to_le_bytes()).unwrap();
        assert_eq!(&sink.buf[pos + 4..pos + 6], &[0, 0]); // row
        assert_eq!(&sink.buf[pos + 6..pos + 8], &[0, 0]); // col
        assert_eq!(&sink.buf[pos + 10..pos + 18], &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x45, 0x40]);
    }

    #[test]
    fn s2_formatted_string_uses_assigned_xf_index() {
        let mut wb = Workbook::new();
        let fmt_id = wb.add_format();
        wb.format_mut(fmt_id).set_bold(true).set_color("blue");
        assert_eq!(wb.format(fmt_id).xf_index, 16);

        wb.add_worksheet(Some("Sheet1"));
        let fmt = wb.format(fmt_id).clone();
        wb.worksheet(0).unwrap().write_string(0, 0, "hi", Some(&fmt)).unwrap();

        let mut sink = MemorySink::new();
        wb.close(&mut sink).unwrap();

        let pos = sink.buf.windows(2).position(|w| w == records::LABEL.to_le_bytes()).unwrap();
        assert_eq!(&sink.buf[pos + 2..pos + 4], &[0x0A, 0x00]); // length = 8 + 2
        assert_eq!(&sink.buf[pos + 8..pos + 10], &[16, 0]); // xf index
    }

    #[test]
    fn s3_two_sheets_second_boundsheet_offset_accounts_for_first_sheet_length() {
        let mut wb = Workbook::new();
        wb.add_worksheet(Some("A"));
        wb.add_worksheet(Some("B"));
        wb.worksheet(0).unwrap().write_number(0, 0, 1.0, None).unwrap();

        let mut sink = MemorySink::new();
        wb.close(&mut sink).unwrap();
        // Smoke check: file parses as a well-formed OLE2 container of a
        // multiple-of-512 size; detailed offset arithmetic is covered by
        // calc_sheet_offsets's own invariant (checked via debug_assert in close()).
        assert_eq!(sink.buf.len() % 512, 0);
    }

    #[test]
    fn close_is_idempotent() {
        let mut wb = Workbook::new();
        wb.add_worksheet(Some("Sheet1"));

        let mut sink1 = MemorySink::new();
        wb.close(&mut sink1).unwrap();
        let mut sink2 = MemorySink::new();
        wb.close(&mut sink2).unwrap();
        assert!(sink2.buf.is_empty(), "second close must be a no-op, writing nothing more");
    }

    #[test]
    fn oversized_workbook_is_rejected_at_close() {
        let mut wb = Workbook::new();
        wb.add_worksheet(Some("Sheet1"));
        // Force biffsize past the OLE2 container's limit without actually
        // allocating that much worksheet data.
        wb.worksheets[0].offset = 0;
        let huge = vec![0u8; ole2::MAX_BIFF_SIZE + 1];
        wb.worksheets[0] = Worksheet::new("Sheet1".to_string(), 0, 0, {
            let mut acc = StreamAccumulator::new_in_memory();
            acc.append(&huge).unwrap();
            acc
        });

        let mut sink = MemorySink::new();
        let err = wb.close(&mut sink).unwrap_err();
        assert!(matches!(err, XlsError::WorkbookTooLarge { .. }));
    }
}
