//! Report ingestion: turns an uploaded neighbor hand-over report into typed
//! relation records.
//!
//! Two encodings are accepted. Delimited text is semicolon-separated with a
//! header line. Spreadsheets are read from their first worksheet; the row
//! right under the header is a non-data row and is dropped, and every column
//! from [`SPREADSHEET_NUMERIC_FROM`] onward must be numeric.
//!
//! Structural problems reject the whole upload with [`Error::Parse`]. Rows
//! whose target cell identifier is unusable are excluded and counted in the
//! [`LoadReport`].

use crate::error::{Error, Result};
use crate::types::{NeighborRelationRecord, RawRow, REQUIRED_COLUMNS};
use crate::util::{parse_f64_safe, parse_u64_safe};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// First spreadsheet column that is coerced to floating point.
pub const SPREADSHEET_NUMERIC_FROM: usize = 14;

/// Rows kept for the upload preview when the caller has no preference.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// Semicolon-separated text
    Csv,
    /// xlsx / xls / ods workbook
    Spreadsheet,
}

impl ReportFormat {
    /// Guess the encoding from an upload's file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.contains("csv") {
            Some(ReportFormat::Csv)
        } else if name.contains("xls") {
            Some(ReportFormat::Spreadsheet)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub invalid_rows: usize,
    pub kept_rows: usize,
}

/// A parsed upload: the raw header and head rows for display plus the
/// validated relation records.
#[derive(Debug, Clone)]
pub struct ReportUpload {
    pub file_name: String,
    pub format: ReportFormat,
    pub headers: Vec<String>,
    pub preview: Vec<Vec<String>>,
    pub records: Vec<NeighborRelationRecord>,
    pub load_report: LoadReport,
}

/// Read a report from disk and parse it.
pub fn load_report(
    path: &Path,
    hint: Option<ReportFormat>,
    preview_rows: usize,
) -> Result<ReportUpload> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse(&bytes, &file_name, hint, preview_rows)
}

/// Parse raw upload bytes.
///
/// `hint` overrides the format sniffed from `file_name`.
pub fn parse(
    bytes: &[u8],
    file_name: &str,
    hint: Option<ReportFormat>,
    preview_rows: usize,
) -> Result<ReportUpload> {
    let format = hint
        .or_else(|| ReportFormat::from_file_name(file_name))
        .ok_or_else(|| Error::UnsupportedFormat(file_name.to_string()))?;
    info!(file = file_name, ?format, bytes = bytes.len(), "parsing report");

    let (headers, rows) = match format {
        ReportFormat::Csv => read_delimited(bytes)?,
        ReportFormat::Spreadsheet => read_spreadsheet(bytes)?,
    };
    build_upload(file_name, format, headers, rows, preview_rows)
}

fn read_delimited(bytes: &[u8]) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .trim(Trim::Headers)
        .from_reader(bytes);
    let headers = rdr
        .headers()
        .map_err(|e| Error::Parse(format!("unreadable header: {}", e)))?
        .clone();
    let rows = rdr
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Parse(e.to_string()))?;
    Ok((headers, rows))
}

fn read_spreadsheet(bytes: &[u8]) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::Parse(format!("unreadable workbook: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Parse("workbook has no worksheets".to_string()))?
        .map_err(|e| Error::Parse(format!("unreadable worksheet: {}", e)))?;
    table_from_range(&range)
}

/// Convert the first worksheet of a report into header and data records.
pub fn table_from_range(range: &Range<Data>) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut rows = range.rows();
    let header_cells = rows
        .next()
        .ok_or_else(|| Error::Parse("worksheet is empty".to_string()))?;
    let headers: StringRecord = header_cells
        .iter()
        .map(|c| cell_text(c).trim().to_string())
        .collect();

    // Rows are relative to the first used cell; the numeric block is not.
    let first_col = range.start().map_or(0, |(_, c)| c as usize);

    let mut records = Vec::new();
    // The row under the header holds units, not data.
    for (idx, cells) in rows.skip(1).enumerate() {
        let mut fields = Vec::with_capacity(cells.len());
        for (col, cell) in cells.iter().enumerate() {
            if first_col + col < SPREADSHEET_NUMERIC_FROM {
                fields.push(cell_text(cell));
                continue;
            }
            let value = coerce_numeric(cell).ok_or_else(|| {
                Error::Parse(format!(
                    "column '{}' has a non-numeric value on data row {}",
                    headers.get(col).unwrap_or("?"),
                    idx + 1
                ))
            })?;
            fields.push(value);
        }
        records.push(StringRecord::from(fields));
    }
    Ok((headers, records))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn coerce_numeric(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => Some(String::new()),
        Data::Int(i) => Some((*i as f64).to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Data::String(s) if s.trim().is_empty() => Some(String::new()),
        Data::String(s) => parse_f64_safe(Some(s.as_str())).map(|v| v.to_string()),
        _ => None,
    }
}

fn check_columns(headers: &StringRecord) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| !headers.iter().any(|h| h == *name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Parse(format!(
            "missing column(s): {}",
            missing.join(", ")
        )))
    }
}

fn build_upload(
    file_name: &str,
    format: ReportFormat,
    headers: StringRecord,
    rows: Vec<StringRecord>,
    preview_rows: usize,
) -> Result<ReportUpload> {
    check_columns(&headers)?;

    let mut records = Vec::with_capacity(rows.len());
    let mut invalid_rows = 0usize;
    for (idx, row) in rows.iter().enumerate() {
        let raw: RawRow = match row.deserialize(Some(&headers)) {
            Ok(r) => r,
            Err(e) => {
                debug!(row = idx + 1, error = %e, "row could not be decoded");
                invalid_rows += 1;
                continue;
            }
        };
        match relation_from_raw(raw) {
            Some(r) => records.push(r),
            None => {
                debug!(row = idx + 1, "row has no usable eci_id");
                invalid_rows += 1;
            }
        }
    }
    if invalid_rows > 0 {
        warn!(
            invalid_rows,
            "excluded rows with a missing or non-numeric eci_id"
        );
    }

    let load_report = LoadReport {
        total_rows: rows.len(),
        invalid_rows,
        kept_rows: records.len(),
    };
    info!(
        total = load_report.total_rows,
        kept = load_report.kept_rows,
        "report parsed"
    );

    Ok(ReportUpload {
        file_name: file_name.to_string(),
        format,
        headers: headers.iter().map(String::from).collect(),
        preview: rows
            .iter()
            .take(preview_rows)
            .map(|r| r.iter().map(String::from).collect())
            .collect(),
        records,
        load_report,
    })
}

fn relation_from_raw(raw: RawRow) -> Option<NeighborRelationRecord> {
    let target_cell_id = parse_u64_safe(raw.eci_id.as_deref())?;
    Some(NeighborRelationRecord {
        source_site_name: raw.source_site_name.unwrap_or_default().trim().to_string(),
        target_cell_id,
        total_hosr: parse_f64_safe(raw.total_hosr.as_deref()),
        prep_sr: parse_f64_safe(raw.prep_sr.as_deref()),
        exec_sr: parse_f64_safe(raw.exec_sr.as_deref()),
        preparations: parse_f64_safe(raw.preparations.as_deref()),
        inter_ho_attempts: parse_f64_safe(raw.inter_ho_attempts.as_deref()),
        inter_ho_successes: parse_f64_safe(raw.inter_ho_successes.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Source LNBTS name;eci_id;NBR Inter eNB Total HOSR;NBR Inter eNB HO Prep SR;NBR Inter eNB Ho Exec SR;NBR Inter eNB HO Preparations;INTER_HO_ATT_NB (M8015C8);INTER_HO_SUCC_NB (M8015C9)";

    fn csv_report(rows: &[&str]) -> Vec<u8> {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s.into_bytes()
    }

    #[test]
    fn parses_semicolon_report() {
        let bytes = csv_report(&[
            "LNBTS_1000001;513;98.5;99.0;99.5;1200;1100;1080",
            "LNBTS_1000001;514;;99.0;99.5;300;290;280",
        ]);
        let upload = parse(&bytes, "nbr_report.csv", None, 1).unwrap();

        assert_eq!(upload.format, ReportFormat::Csv);
        assert_eq!(upload.records.len(), 2);
        assert_eq!(upload.preview.len(), 1);
        assert_eq!(upload.headers.len(), 8);

        let first = &upload.records[0];
        assert_eq!(first.source_site_name, "LNBTS_1000001");
        assert_eq!(first.target_cell_id, 513);
        assert_eq!(first.total_hosr, Some(98.5));
        assert_eq!(first.preparations, Some(1200.0));
        assert_eq!(upload.records[1].total_hosr, None);
    }

    #[test]
    fn scientific_notation_metrics_are_kept() {
        let bytes = csv_report(&["LNBTS_1000001;513;9.5E+01;99;99;1.2E+03;1;1"]);
        let upload = parse(&bytes, "nbr_report.csv", None, 5).unwrap();

        let r = &upload.records[0];
        assert_eq!(r.total_hosr, Some(95.0));
        assert_eq!(r.preparations, Some(1200.0));
    }

    #[test]
    fn rows_without_usable_eci_are_excluded() {
        let bytes = csv_report(&[
            "LNBTS_1000001;513;98.5;99.0;99.5;1200;1100;1080",
            "LNBTS_1000001;;98.5;99.0;99.5;1200;1100;1080",
            "LNBTS_1000001;abc;98.5;99.0;99.5;1200;1100;1080",
        ]);
        let upload = parse(&bytes, "nbr_report.csv", None, DEFAULT_PREVIEW_ROWS).unwrap();

        assert_eq!(upload.records.len(), 1);
        assert_eq!(
            upload.load_report,
            LoadReport {
                total_rows: 3,
                invalid_rows: 2,
                kept_rows: 1
            }
        );
        // The preview still shows the raw rows.
        assert_eq!(upload.preview.len(), 3);
    }

    #[test]
    fn wrong_delimiter_is_a_parse_error() {
        let bytes = HEADER.replace(';', ",") + "\nLNBTS_1,513,98.5,99,99.5,1200,1100,1080";
        let err = parse(bytes.as_bytes(), "report.csv", None, 5).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got {err:?}");
    }

    #[test]
    fn binary_garbage_is_a_parse_error() {
        let bytes: Vec<u8> = vec![0xff, 0xfe, 0x00, 0x9c, 0x3b, 0x0a, 0xc3, 0x28];
        let err = parse(&bytes, "report.csv", None, 5).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got {err:?}");

        let err = parse(&bytes, "report.xlsx", None, 5).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got {err:?}");
    }

    #[test]
    fn ragged_rows_reject_the_whole_upload() {
        let bytes = csv_report(&[
            "LNBTS_1000001;513;98.5;99.0;99.5;1200;1100;1080",
            "LNBTS_1000001;514;98.5",
        ]);
        let err = parse(&bytes, "report.csv", None, 5).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn unknown_extension_needs_a_hint() {
        let bytes = csv_report(&["LNBTS_1000001;513;98.5;99.0;99.5;1200;1100;1080"]);
        let err = parse(&bytes, "report.txt", None, 5).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));

        let upload = parse(&bytes, "report.txt", Some(ReportFormat::Csv), 5).unwrap();
        assert_eq!(upload.records.len(), 1);
    }

    #[test]
    fn format_is_sniffed_from_file_name() {
        assert_eq!(ReportFormat::from_file_name("NBR.CSV"), Some(ReportFormat::Csv));
        assert_eq!(
            ReportFormat::from_file_name("nbr.xlsx"),
            Some(ReportFormat::Spreadsheet)
        );
        assert_eq!(ReportFormat::from_file_name("nbr.json"), None);
    }

    fn sheet(rows: &[Vec<Data>]) -> Range<Data> {
        sheet_from_column(0, rows)
    }

    /// A used range whose first cell sits in column `first_col`.
    fn sheet_from_column(first_col: u32, rows: &[Vec<Data>]) -> Range<Data> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(1) as u32;
        let mut range = Range::new(
            (0, first_col),
            (rows.len() as u32 - 1, first_col + width - 1),
        );
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, first_col + c as u32), cell.clone());
            }
        }
        range
    }

    fn sheet_header() -> Vec<Data> {
        // Thirteen filler columns put the metrics in the coerced block.
        let mut header: Vec<Data> = (0..12)
            .map(|i| Data::String(format!("Filler {}", i)))
            .collect();
        header.extend(REQUIRED_COLUMNS.iter().map(|c| Data::String(c.to_string())));
        header
    }

    fn sheet_row(eci: Data, hosr: Data) -> Vec<Data> {
        let mut row: Vec<Data> = (0..12).map(|_| Data::Empty).collect();
        row.push(Data::String("LNBTS_1000001".to_string()));
        row.push(eci);
        row.push(hosr);
        row.extend((0..5).map(|_| Data::Float(10.0)));
        row
    }

    #[test]
    fn spreadsheet_drops_unit_row_and_coerces_numbers() {
        let mut units: Vec<Data> = (0..20).map(|_| Data::Empty).collect();
        units[14] = Data::String("%".to_string());
        let range = sheet(&[
            sheet_header(),
            units,
            sheet_row(Data::Float(513.0), Data::Int(97)),
            sheet_row(Data::Int(770), Data::String(" 88.5 ".to_string())),
        ]);

        let (headers, rows) = table_from_range(&range).unwrap();
        let upload =
            build_upload("nbr.xlsx", ReportFormat::Spreadsheet, headers, rows, 5).unwrap();

        assert_eq!(upload.load_report.total_rows, 2);
        assert_eq!(upload.records[0].target_cell_id, 513);
        assert_eq!(upload.records[0].total_hosr, Some(97.0));
        assert_eq!(upload.records[1].target_cell_id, 770);
        assert_eq!(upload.records[1].total_hosr, Some(88.5));
    }

    #[test]
    fn spreadsheet_accepts_scientific_notation() {
        let range = sheet(&[
            sheet_header(),
            (0..20).map(|_| Data::Empty).collect(),
            sheet_row(Data::Int(513), Data::String("9.5E+01".to_string())),
        ]);
        let (headers, rows) = table_from_range(&range).unwrap();
        let upload =
            build_upload("nbr.xlsx", ReportFormat::Spreadsheet, headers, rows, 5).unwrap();

        assert_eq!(upload.records[0].total_hosr, Some(95.0));
    }

    #[test]
    fn numeric_block_uses_absolute_columns() {
        // Column A is empty, so the used range starts at column B and the
        // HOSR column is still absolute column 14.
        let mut header = sheet_header();
        header.remove(0);
        let mut row = sheet_row(Data::Int(513), Data::String("n/a".to_string()));
        row.remove(0);
        let range = sheet_from_column(1, &[header, vec![Data::Empty; 19], row]);

        let err = table_from_range(&range).unwrap_err();
        assert!(
            matches!(&err, Error::Parse(m) if m.contains("NBR Inter eNB Total HOSR")),
            "got {err:?}"
        );
    }

    #[test]
    fn spreadsheet_text_in_numeric_block_is_rejected() {
        let range = sheet(&[
            sheet_header(),
            (0..20).map(|_| Data::Empty).collect(),
            sheet_row(Data::Int(513), Data::String("n/a".to_string())),
        ]);
        let err = table_from_range(&range).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
