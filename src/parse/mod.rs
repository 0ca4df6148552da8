mod sheet;

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

/// Header spellings that identify the email column outright. Matched
/// case-insensitively before falling back to a substring scan.
const CANONICAL_EMAIL_HEADERS: &[&str] = &[
    "email",
    "e-mail",
    "email address",
    "e-mail address",
    "subscriber email",
    "contact email",
];

/// Why a file could not be parsed into a table. Every variant is recovered
/// into the pipeline's failure message; none are fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{0}")]
    EmptyFile(String),
    #[error("no email column found (looked for a header containing \"email\")")]
    NoEmailColumn,
    #[error("could not read the file: {0}")]
    Malformed(String),
}

/// One parsed input file: the first sheet/table of whatever container the
/// bytes held, as header-keyed text records.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    /// Column names in display order, trimmed. Not deduplicated.
    pub headers: Vec<String>,
    /// One record per data row, in source order, each holding an entry for
    /// every header (missing cells coerce to ""). When two columns share a
    /// header name the later column overwrites the earlier one.
    pub rows: Vec<HashMap<String, String>>,
    /// Index into `headers` of the inferred email column.
    pub email_column_index: usize,
    /// Name of the inferred email column, identical to
    /// `headers[email_column_index]`.
    pub email_column_name: String,
    /// True when the source container held more than one sheet; only the
    /// first is ever read.
    pub has_multiple_sheets: bool,
}

/// Parse a raw buffer into a [`ParsedTable`]. Row 0 is the header row; the
/// rest are data rows, with entirely-blank rows dropped.
#[tracing::instrument(level = "debug", skip(bytes), fields(file = %file_name, bytes = bytes.len()))]
pub fn parse_table(bytes: &[u8], file_name: &str) -> Result<ParsedTable, ParseError> {
    let grid = sheet::read_grid(bytes)?;
    if grid.cells.is_empty() {
        return Err(ParseError::EmptyFile("the file contains no data".into()));
    }

    let headers: Vec<String> = grid.cells[0].iter().map(|c| c.trim().to_string()).collect();
    if headers.iter().all(String::is_empty) {
        return Err(ParseError::EmptyFile("the file has no column headers".into()));
    }

    let data_rows = &grid.cells[1..];
    if data_rows.is_empty() {
        return Err(ParseError::EmptyFile(
            "the file has headers but no data rows".into(),
        ));
    }

    let email_column_index = infer_email_column(&headers).ok_or(ParseError::NoEmailColumn)?;
    let email_column_name = headers[email_column_index].clone();

    let mut rows = Vec::with_capacity(data_rows.len());
    for cells in data_rows {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let mut record = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            record.insert(header.clone(), cells.get(i).cloned().unwrap_or_default());
        }
        rows.push(record);
    }

    debug!(
        rows = rows.len(),
        email_column = %email_column_name,
        sheets = grid.sheet_count,
        "parsed table"
    );

    Ok(ParsedTable {
        headers,
        rows,
        email_column_index,
        email_column_name,
        has_multiple_sheets: grid.sheet_count > 1,
    })
}

/// Find the email column: an exact canonical-form match wins over any
/// header merely containing "email". Matching is name-based only; cell
/// contents are never inspected.
fn infer_email_column(headers: &[String]) -> Option<usize> {
    if let Some(idx) = headers.iter().position(|h| {
        let lower = h.to_lowercase();
        CANONICAL_EMAIL_HEADERS.iter().any(|c| *c == lower)
    }) {
        return Some(idx);
    }
    headers
        .iter()
        .position(|h| h.to_lowercase().contains("email"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn parse(bytes: &[u8]) -> Result<ParsedTable, ParseError> {
        parse_table(bytes, "test.csv")
    }

    /// Build a minimal xlsx workbook (inline strings, no shared-string
    /// table) with one worksheet per `(name, rows)` pair.
    fn build_xlsx(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut content_types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        );
        let mut workbook_sheets = String::new();
        let mut workbook_rels = String::new();
        for (i, (name, _)) in sheets.iter().enumerate() {
            let n = i + 1;
            content_types.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
            workbook_sheets.push_str(&format!(
                r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#
            ));
            workbook_rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));
        }
        content_types.push_str("</Types>");

        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(content_types.as_bytes()).unwrap();

        zip.start_file("_rels/.rels", options).unwrap();
        zip.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#).unwrap();

        zip.start_file("xl/workbook.xml", options).unwrap();
        zip.write_all(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{workbook_sheets}</sheets></workbook>"#
        ).as_bytes()).unwrap();

        zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        zip.write_all(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{workbook_rels}</Relationships>"#
        ).as_bytes()).unwrap();

        for (i, (_, rows)) in sheets.iter().enumerate() {
            let mut sheet_data = String::new();
            for (r, row) in rows.iter().enumerate() {
                sheet_data.push_str(&format!(r#"<row r="{}">"#, r + 1));
                for (c, value) in row.iter().enumerate() {
                    let col = (b'A' + c as u8) as char;
                    sheet_data.push_str(&format!(
                        r#"<c r="{col}{}" t="inlineStr"><is><t>{value}</t></is></c>"#,
                        r + 1
                    ));
                }
                sheet_data.push_str("</row>");
            }
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                .unwrap();
            zip.write_all(format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
            ).as_bytes()).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn parses_simple_csv() {
        let table = parse(b"email,name\na@x.com,Ann\nb@x.com,Bob\n").unwrap();
        assert_eq!(table.headers, vec!["email", "name"]);
        assert_eq!(table.email_column_index, 0);
        assert_eq!(table.email_column_name, "email");
        assert!(!table.has_multiple_sheets);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["email"], "a@x.com");
        assert_eq!(table.rows[0]["name"], "Ann");
        assert_eq!(table.rows[1]["email"], "b@x.com");
    }

    #[test]
    fn pads_missing_cells_with_empty_strings() {
        let table = parse(b"email,name,city\na@x.com\n").unwrap();
        assert_eq!(table.rows[0]["email"], "a@x.com");
        assert_eq!(table.rows[0]["name"], "");
        assert_eq!(table.rows[0]["city"], "");
    }

    #[test]
    fn skips_entirely_blank_rows() {
        let table = parse(b"email,name\na@x.com,Ann\n , \nb@x.com,Bob\n").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1]["email"], "b@x.com");
    }

    #[test]
    fn canonical_header_wins_over_earlier_substring_match() {
        let table = parse(b"emails_backup,E-Mail\nold@x.com,new@x.com\n").unwrap();
        assert_eq!(table.email_column_index, 1);
        assert_eq!(table.email_column_name, "E-Mail");
    }

    #[test]
    fn falls_back_to_substring_match() {
        let table = parse(b"name,Customer Email Addr\nAnn,a@x.com\n").unwrap();
        assert_eq!(table.email_column_index, 1);
        assert_eq!(table.email_column_name, "Customer Email Addr");
    }

    #[test]
    fn header_match_is_name_based_not_content_based() {
        // a column full of addresses under an unrecognized name never wins
        let err = parse(b"name,address\nAnn,a@x.com\n").unwrap_err();
        assert_eq!(err, ParseError::NoEmailColumn);
    }

    #[test]
    fn empty_file_taxonomy() {
        assert!(matches!(parse(b"").unwrap_err(), ParseError::EmptyFile(_)));
        assert!(matches!(
            parse(b" , , \n").unwrap_err(),
            ParseError::EmptyFile(_)
        ));
        let headers_only = parse(b"email,name\n").unwrap_err();
        assert!(matches!(headers_only, ParseError::EmptyFile(_)));
        assert!(headers_only.to_string().contains("no data rows"));
    }

    #[test]
    fn duplicate_headers_keep_the_later_column() {
        let table = parse(b"email,email\nfirst@x.com,second@x.com\n").unwrap();
        assert_eq!(table.headers, vec!["email", "email"]);
        assert_eq!(table.rows[0]["email"], "second@x.com");
    }

    #[test]
    fn headers_are_trimmed_but_cells_are_not() {
        let table = parse(b" email , name\n  a@x.com  ,Ann\n").unwrap();
        assert_eq!(table.headers, vec!["email", "name"]);
        assert_eq!(table.rows[0]["email"], "  a@x.com  ");
    }

    #[test]
    fn parses_single_sheet_xlsx() {
        let bytes = build_xlsx(&[(
            "Contacts",
            &[
                &["Email Address", "Name"][..],
                &["a@x.com", "Ann"][..],
                &["b@x.com", "Bob"][..],
            ],
        )]);
        let table = parse_table(&bytes, "contacts.xlsx").unwrap();
        assert_eq!(table.headers, vec!["Email Address", "Name"]);
        assert_eq!(table.email_column_index, 0);
        assert!(!table.has_multiple_sheets);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1]["Email Address"], "b@x.com");
        assert_eq!(table.rows[1]["Name"], "Bob");
    }

    #[test]
    fn flags_multi_sheet_workbooks_and_reads_only_the_first() {
        let bytes = build_xlsx(&[
            (
                "First",
                &[&["email"][..], &["keep@x.com"][..]],
            ),
            (
                "Second",
                &[&["email"][..], &["ignored@x.com"][..]],
            ),
        ]);
        let table = parse_table(&bytes, "workbook.xlsx").unwrap();
        assert!(table.has_multiple_sheets);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0]["email"], "keep@x.com");
    }
}
