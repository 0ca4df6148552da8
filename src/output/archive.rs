use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Fixed entry name of the cleaned contact list inside the archive.
pub const CLEANED_LIST_ENTRY: &str = "cleaned_list.csv";
/// Fixed entry name of the removal audit report inside the archive.
pub const AUDIT_REPORT_ENTRY: &str = "removed_rows_audit.csv";

/// Bundle the generated CSV payloads into a single in-memory zip, suitable
/// for direct download. The audit entry is written only when a report was
/// actually produced.
pub fn bundle_outputs(cleaned_csv: &str, audit_csv: Option<&str>) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(CLEANED_LIST_ENTRY, options)
        .context("starting cleaned list entry")?;
    zip.write_all(cleaned_csv.as_bytes())
        .context("writing cleaned list entry")?;

    if let Some(audit) = audit_csv {
        zip.start_file(AUDIT_REPORT_ENTRY, options)
            .context("starting audit report entry")?;
        zip.write_all(audit.as_bytes())
            .context("writing audit report entry")?;
    }

    let cursor = zip.finish().context("finalizing archive")?;
    Ok(cursor.into_inner())
}
