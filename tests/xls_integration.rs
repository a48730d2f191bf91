//! End-to-end tests driving the public `Workbook`/`Worksheet` API against
//! an in-memory sink, covering the S1-S6 scenarios from the specification's
//! testable-properties section.

use duke_sheets_xls::{MemorySink, Workbook};
use pretty_assertions::assert_eq as pretty_assert_eq;

fn close_to_bytes(wb: &mut Workbook) -> Vec<u8> {
    let mut sink = MemorySink::new();
    wb.close(&mut sink).unwrap();
    sink.buf
}

fn find_record(bytes: &[u8], id: u16) -> usize {
    let needle = id.to_le_bytes();
    bytes
        .windows(2)
        .position(|w| w == needle)
        .unwrap_or_else(|| panic!("record 0x{id:04X} not found"))
}

#[test]
fn s1_number_write_produces_ole_header_and_number_record() {
    let mut wb = Workbook::new();
    wb.add_worksheet(Some("Sheet1"));
    wb.worksheet(0).unwrap().write_number(0, 0, 42.0, None).unwrap();

    let bytes = close_to_bytes(&mut wb);

    assert_eq!(&bytes[0..8], &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    let pos = find_record(&bytes, 0x0203);
    assert_eq!(&bytes[pos + 2..pos + 4], &[0x0E, 0x00]); // length = 14
    assert_eq!(&bytes[pos + 4..pos + 6], &[0, 0]); // row
    assert_eq!(&bytes[pos + 6..pos + 8], &[0, 0]); // col
    assert_eq!(&bytes[pos + 8..pos + 10], &[0x0F, 0x00]); // default xf
    assert_eq!(&bytes[pos + 10..pos + 18], &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x45, 0x40]);
}

#[test]
fn s2_formatted_string_gets_assigned_xf_index_and_correct_length() {
    let mut wb = Workbook::new();
    let fmt_id = wb.add_format();
    wb.format_mut(fmt_id).set_bold(true).set_color("blue");
    let fmt = wb.format(fmt_id).clone();

    wb.add_worksheet(Some("Sheet1"));
    wb.worksheet(0).unwrap().write_string(0, 0, "hi", Some(&fmt)).unwrap();

    let bytes = close_to_bytes(&mut wb);
    let pos = find_record(&bytes, 0x0204);
    assert_eq!(&bytes[pos + 2..pos + 4], &[0x0A, 0x00]); // 8 + 2
    assert_eq!(&bytes[pos + 8..pos + 10], &[16, 0]);
}

#[test]
fn s3_two_worksheets_produce_a_well_formed_container() {
    let mut wb = Workbook::new();
    wb.add_worksheet(Some("A"));
    wb.add_worksheet(Some("B"));
    wb.worksheet(0).unwrap().write_number(0, 0, 1.0, None).unwrap();
    wb.worksheet(1).unwrap().write_string(2, 2, "second sheet", None).unwrap();

    let bytes = close_to_bytes(&mut wb);
    assert_eq!(bytes.len() % 512, 0);

    // Both sheets' BOF records must appear, and sheet B's must come after
    // sheet A's body since the workbook streams sheets in add-order.
    let first_bof = find_record(&bytes, 0x0809);
    let next_bof = bytes[first_bof + 2..]
        .windows(2)
        .position(|w| w == 0x0809u16.to_le_bytes())
        .map(|p| p + first_bof + 2);
    assert!(next_bof.is_some(), "expected a second BOF for the second sheet");
}

#[test]
fn s4_sum_formula_compiles_to_documented_ptg_stream() {
    let mut wb = Workbook::new();
    wb.add_worksheet(Some("Sheet1"));
    wb.worksheet(0).unwrap().write_formula(0, 0, "=SUM(A1,A2,A3)", None).unwrap();

    let bytes = close_to_bytes(&mut wb);
    let pos = find_record(&bytes, 0x0006);
    let ptg_len = u16::from_le_bytes([bytes[pos + 20], bytes[pos + 21]]) as usize;
    let ptg = &bytes[pos + 22..pos + 22 + ptg_len];
    assert_eq!(
        ptg,
        &[
            0x44, 0x00, 0x00, 0x00, 0x44, 0x01, 0x00, 0x00, 0x44, 0x02, 0x00, 0x00, 0x42, 0x03, 0x04, 0x00
        ]
    );
}

#[test]
fn s5_out_of_range_row_is_rejected_and_does_not_touch_dimensions() {
    let mut wb = Workbook::new();
    wb.add_worksheet(Some("Sheet1"));
    let err = wb.worksheet(0).unwrap().write_number(65536, 0, 1.0, None).unwrap_err();
    assert!(matches!(err, duke_sheets_xls::XlsError::OutOfRange { row: 65536, col: 0 }));

    // The sheet must still close cleanly with an empty (default) DIMENSIONS.
    let bytes = close_to_bytes(&mut wb);
    assert_eq!(bytes.len() % 512, 0);
}

#[test]
fn s6_small_workbook_file_size_matches_sector_math() {
    let mut wb = Workbook::new();
    wb.add_worksheet(Some("Sheet1"));
    // Pad the sheet body so biffsize lands comfortably under 4096 but the
    // exact value is not load-bearing for this assertion: only whether the
    // file size comes out as a multiple of 512 after padding.
    for row in 0..20u32 {
        wb.worksheet(0).unwrap().write_number(row, 0, row as f64, None).unwrap();
    }
    let bytes = close_to_bytes(&mut wb);
    assert_eq!(bytes.len() % 512, 0);
}

#[test]
fn hyperlink_emits_label_then_hlink_record_with_url_bytes() {
    let mut wb = Workbook::new();
    wb.add_worksheet(Some("Sheet1"));
    wb.worksheet(0)
        .unwrap()
        .write_url(1, 1, "https://example.com/path", Some("click here"), None)
        .unwrap();

    let bytes = close_to_bytes(&mut wb);
    let label_pos = find_record(&bytes, 0x0204);
    let label_len = u16::from_le_bytes([bytes[label_pos + 2], bytes[label_pos + 3]]) as usize;
    assert_eq!(label_len, 8 + "click here".len());

    let hlink_pos = find_record(&bytes, 0x01B8);
    assert!(bytes[hlink_pos..].windows("https://example.com/path".len())
        .any(|w| w == b"https://example.com/path"));
}

#[test]
fn scratch_backed_workbook_produces_identical_records_to_in_memory() {
    let dir = tempfile::tempdir().unwrap();

    let mut in_memory = Workbook::new();
    in_memory.add_worksheet(Some("Sheet1"));
    in_memory.worksheet(0).unwrap().write_number(0, 0, 42.0, None).unwrap();
    let a = close_to_bytes(&mut in_memory);

    let mut scratch = Workbook::with_scratch_dir(dir.path());
    scratch.add_worksheet(Some("Sheet1"));
    scratch.worksheet(0).unwrap().write_number(0, 0, 42.0, None).unwrap();
    let b = close_to_bytes(&mut scratch);

    // pretty_assertions gives a readable diff if the scratch-backed path
    // ever drifts from the in-memory path's byte layout.
    pretty_assert_eq!(a, b);
}

#[test]
fn file_sink_round_trip_writes_a_readable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.xls");

    let (mut wb, mut sink) = duke_sheets_xls::create(&path).unwrap();
    wb.add_worksheet(Some("Sheet1"));
    wb.worksheet(0).unwrap().write_number(0, 0, 1.5, None).unwrap();
    wb.close(&mut sink).unwrap();

    let contents = std::fs::read(&path).unwrap();
    assert_eq!(&contents[0..8], &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    assert_eq!(contents.len() % 512, 0);
}

#[test]
fn formula_with_unknown_function_is_rejected_without_writing_a_record() {
    let mut wb = Workbook::new();
    wb.add_worksheet(Some("Sheet1"));
    let err = wb.worksheet(0).unwrap().write_formula(0, 0, "=NOPE(1)", None).unwrap_err();
    assert!(matches!(err, duke_sheets_xls::XlsError::FormulaSyntax(_)));

    let bytes = close_to_bytes(&mut wb);
    // No FORMULA record (0x0006) should appear since the write was rejected.
    assert!(!bytes.windows(2).any(|w| w == 0x0006u16.to_le_bytes()));
}

#[test]
fn column_width_and_row_height_survive_into_the_closed_stream() {
    let mut wb = Workbook::new();
    wb.add_worksheet(Some("Sheet1"));
    {
        let ws = wb.worksheet(0).unwrap();
        ws.set_column(0, 3, 12);
        ws.set_row(0, Some(30), None).unwrap();
        ws.write_number(0, 0, 1.0, None).unwrap();
    }
    let bytes = close_to_bytes(&mut wb);
    // COLINFO (0x007D) must be emitted since a column width was set.
    let _ = find_record(&bytes, 0x007D);
    // ROW (0x0208) must be emitted since a row height was set.
    let _ = find_record(&bytes, 0x0208);
}

#[test]
fn format_with_custom_number_format_string_is_emitted_once_per_distinct_string() {
    let mut wb = Workbook::new();
    let fmt_a = wb.add_format();
    wb.format_mut(fmt_a).set_num_format_str("0.00%");
    let fmt_b = wb.add_format();
    wb.format_mut(fmt_b).set_num_format_str("0.00%"); // same string, should dedup
    let a = wb.format(fmt_a).clone();
    let b = wb.format(fmt_b).clone();

    wb.add_worksheet(Some("Sheet1"));
    wb.worksheet(0).unwrap().write_number(0, 0, 0.5, Some(&a)).unwrap();
    wb.worksheet(0).unwrap().write_number(1, 0, 0.25, Some(&b)).unwrap();

    let bytes = close_to_bytes(&mut wb);
    let format_id = find_record(&bytes, 0x041E);
    assert!(bytes[format_id..].windows(5).any(|w| w == b"0.00%"));
}
