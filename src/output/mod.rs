pub mod archive;

use std::collections::HashMap;

use crate::clean::RemovedRow;

/// Audit report column headers, in output order.
pub const AUDIT_HEADERS: [&str; 3] = ["Original Row", "Email", "Removal Reason"];

/// Wrap in quotes (doubling interior quotes) only when the field contains
/// a comma, quote, or newline; otherwise emit verbatim.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(",")
}

/// Serialize header-keyed records back to CSV, fields in header order.
/// Rows missing a header key fall back to an empty field.
pub fn rows_to_csv(headers: &[String], rows: &[HashMap<String, String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(csv_line(headers.iter().map(String::as_str)));
    for row in rows {
        lines.push(csv_line(
            headers
                .iter()
                .map(|h| row.get(h).map(String::as_str).unwrap_or("")),
        ));
    }
    lines.join("\n")
}

/// Render the removed-row audit report. Row order mirrors `removed`, which
/// the matcher keeps in original contact-file order.
pub fn audit_report_csv(removed: &[RemovedRow]) -> String {
    let mut lines = Vec::with_capacity(removed.len() + 1);
    lines.push(csv_line(AUDIT_HEADERS));
    for entry in removed {
        let row_number = entry.original_row_number.to_string();
        lines.push(csv_line([
            row_number.as_str(),
            entry.email.as_str(),
            entry.reason.label(),
        ]));
    }
    lines.join("\n")
}
