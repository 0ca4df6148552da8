use std::time::Instant;

use tracing::{error, info};

use crate::clean::{self, CleanStats};
use crate::output::{self, archive};
use crate::parse;

/// One uploaded input: the raw bytes plus the declared filename. The name
/// drives logging and output naming only; format detection is content-based.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Per-run toggles supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub generate_audit_report: bool,
    pub remove_invalid_emails: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            generate_audit_report: true,
            remove_invalid_emails: true,
        }
    }
}

/// Everything a successful run hands back: the downloadable archive, the
/// two individually downloadable artifacts, the counts, and one
/// multi-sheet warning flag per input file.
#[derive(Debug)]
pub struct RunOutput {
    pub archive: Vec<u8>,
    pub cleaned_csv: String,
    pub audit_csv: Option<String>,
    pub stats: CleanStats,
    pub contact_has_multiple_sheets: bool,
    pub suppression_has_multiple_sheets: bool,
}

/// Settled result of one pipeline run. Exactly one variant is ever
/// produced; a failure carries a single message ready to show to a user,
/// and discards all work-in-progress.
#[derive(Debug)]
pub enum ProcessingOutcome {
    Success(RunOutput),
    Failure { message: String },
}

const SAME_FILE_MESSAGE: &str =
    "The same file was uploaded to both slots. Upload a contact list and a separate suppression list.";
const GENERIC_FAILURE_MESSAGE: &str =
    "Something went wrong while processing the files. Please try again.";

/// Length check first so mismatched sizes never touch the bytes.
fn same_bytes(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a == b
}

/// Run the whole pipeline on the calling thread: identical-file check,
/// parse both inputs, match, serialize, bundle. This is also the fallback
/// path for callers without a worker runtime; in that mode it can block.
#[tracing::instrument(level = "info", skip_all, fields(contact = %contact.name, suppression = %suppression.name))]
pub fn run(contact: RawFile, suppression: RawFile, options: RunOptions) -> ProcessingOutcome {
    let start = Instant::now();

    if same_bytes(&contact.bytes, &suppression.bytes) {
        return ProcessingOutcome::Failure {
            message: SAME_FILE_MESSAGE.to_string(),
        };
    }

    let contact_table = match parse::parse_table(&contact.bytes, &contact.name) {
        Ok(table) => table,
        Err(err) => {
            return ProcessingOutcome::Failure {
                message: format!("Contact List: {err}"),
            }
        }
    };
    let suppression_table = match parse::parse_table(&suppression.bytes, &suppression.name) {
        Ok(table) => table,
        Err(err) => {
            return ProcessingOutcome::Failure {
                message: format!("Suppression List: {err}"),
            }
        }
    };

    let result = clean::match_and_clean(
        &contact_table,
        &suppression_table,
        options.remove_invalid_emails,
    );

    let cleaned_csv = output::rows_to_csv(&contact_table.headers, &result.cleaned_rows);
    let audit_csv = if options.generate_audit_report && !result.removed_rows.is_empty() {
        Some(output::audit_report_csv(&result.removed_rows))
    } else {
        None
    };

    let archive_bytes = match archive::bundle_outputs(&cleaned_csv, audit_csv.as_deref()) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("bundling outputs failed: {err:#}");
            return ProcessingOutcome::Failure {
                message: GENERIC_FAILURE_MESSAGE.to_string(),
            };
        }
    };

    info!(
        total = result.stats.total_rows,
        cleaned = result.stats.cleaned_count,
        suppressed = result.stats.suppressed_count,
        invalid = result.stats.invalid_count,
        elapsed = ?start.elapsed(),
        "run settled"
    );

    ProcessingOutcome::Success(RunOutput {
        archive: archive_bytes,
        cleaned_csv,
        audit_csv,
        stats: result.stats,
        contact_has_multiple_sheets: contact_table.has_multiple_sheets,
        suppression_has_multiple_sheets: suppression_table.has_multiple_sheets,
    })
}

/// Run the pipeline off the calling thread. Ownership of both input
/// buffers moves into the worker; the caller awaits a single settled
/// outcome and is never blocked. A panic inside the worker settles as a
/// generic failure instead of tearing the host down.
pub async fn run_in_worker(
    contact: RawFile,
    suppression: RawFile,
    options: RunOptions,
) -> ProcessingOutcome {
    match tokio::task::spawn_blocking(move || run(contact, suppression, options)).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("pipeline worker died: {err}");
            ProcessingOutcome::Failure {
                message: GENERIC_FAILURE_MESSAGE.to_string(),
            }
        }
    }
}
