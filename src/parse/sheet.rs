// src/parse/sheet.rs
//
// Container readers: turn an in-memory buffer into a rectangular grid of
// cell text, whether the buffer is delimited text or a packaged
// spreadsheet. Detection is content-based; the declared filename is never
// consulted.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, DataType, Reader};
use csv::ReaderBuilder;

use super::ParseError;

/// Local file header magic of a zip container (xlsx, ods).
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
/// Compound File Binary magic (legacy xls).
const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// A raw rectangular grid read from the first sheet/table of a container,
/// plus how many sheets the container held in total.
#[derive(Debug)]
pub(super) struct SheetGrid {
    pub cells: Vec<Vec<String>>,
    pub sheet_count: usize,
}

pub(super) fn read_grid(bytes: &[u8]) -> Result<SheetGrid, ParseError> {
    if is_packaged_container(bytes) {
        read_workbook_grid(bytes)
    } else {
        read_delimited_grid(bytes)
    }
}

fn is_packaged_container(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZIP_MAGIC) || bytes.starts_with(&CFB_MAGIC)
}

/// Read the first worksheet of an xlsx/xls/ods workbook into a grid.
fn read_workbook_grid(bytes: &[u8]) -> Result<SheetGrid, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Malformed(format!("spreadsheet container: {e}")))?;

    let sheet_count = workbook.sheet_names().len();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::EmptyFile("the workbook contains no sheets".into()))?
        .map_err(|e| ParseError::Malformed(format!("first worksheet: {e}")))?;

    let cells = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    cell.as_string()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("{cell}"))
                })
                .collect()
        })
        .collect();

    Ok(SheetGrid { cells, sheet_count })
}

/// Read delimited text into a grid. Rows may have uneven field counts; the
/// caller pads them against the header row.
fn read_delimited_grid(bytes: &[u8]) -> Result<SheetGrid, ParseError> {
    let decoded = String::from_utf8_lossy(bytes);
    // strip a UTF-8 BOM so the first header cell matches by name
    let text = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(text))
        .from_reader(Cursor::new(text.as_bytes()));

    let mut cells: Vec<Vec<String>> = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| ParseError::Malformed(format!("record {}: {}", idx + 1, e)))?;
        cells.push(record.iter().map(str::to_string).collect());
    }

    Ok(SheetGrid {
        cells,
        sheet_count: 1,
    })
}

/// Pick the delimiter whose per-line count is both high and consistent
/// across a sample of the first lines. Falls back to comma.
fn detect_delimiter(text: &str) -> u8 {
    let sample: Vec<&str> = text.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0.0f32;
    for &candidate in &DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| line.bytes().filter(|&b| b == candidate).count())
            .collect();
        if counts.is_empty() {
            continue;
        }

        let avg = counts.iter().sum::<usize>() as f32 / counts.len() as f32;
        let variance =
            counts.iter().map(|&c| (c as f32 - avg).powi(2)).sum::<f32>() / counts.len() as f32;
        let score = avg / (1.0 + variance.sqrt());

        if score > best_score {
            best = candidate;
            best_score = score;
        }
    }
    best
}
