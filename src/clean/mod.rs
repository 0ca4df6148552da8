use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::parse::ParsedTable;
use crate::validate::{is_valid_email, normalize_email};

/// Why a contact row was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Suppressed,
    Invalid,
}

impl RemovalReason {
    /// Human label used in the audit report.
    pub fn label(self) -> &'static str {
        match self {
            RemovalReason::Suppressed => "Suppressed",
            RemovalReason::Invalid => "Invalid Format",
        }
    }
}

/// One removed contact row, with enough context to audit the removal.
#[derive(Debug, Clone)]
pub struct RemovedRow {
    /// 1-based line number in the source file counting the header row, so
    /// the first data row is 2.
    pub original_row_number: usize,
    /// The email cell exactly as it appeared, casing preserved.
    pub email: String,
    pub reason: RemovalReason,
    /// The full original row record.
    pub row: HashMap<String, String>,
}

/// Aggregate counts for one run. Always satisfies
/// `total_rows == cleaned_count + suppressed_count + invalid_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanStats {
    pub total_rows: usize,
    pub cleaned_count: usize,
    pub suppressed_count: usize,
    pub invalid_count: usize,
}

/// The matcher's partition of the contact table. Both partitions preserve
/// the contact file's original row order.
#[derive(Debug)]
pub struct MatchResult {
    pub cleaned_rows: Vec<HashMap<String, String>>,
    pub removed_rows: Vec<RemovedRow>,
    pub stats: CleanStats,
}

enum Verdict {
    Keep,
    Remove(RemovalReason),
}

/// Collect the normalized, non-empty emails from the suppression table.
/// Only its email column is ever read; duplicates collapse in the set.
pub fn suppression_set(table: &ParsedTable) -> HashSet<String> {
    table
        .rows
        .iter()
        .filter_map(|row| row.get(&table.email_column_name))
        .map(|cell| normalize_email(cell))
        .filter(|email| !email.is_empty())
        .collect()
}

/// Partition contact rows into kept and removed. Matching is exact string
/// equality after normalization; the suppression check always takes
/// precedence over the invalid-format check.
#[tracing::instrument(level = "debug", skip_all, fields(contact_rows = contact.rows.len()))]
pub fn match_and_clean(
    contact: &ParsedTable,
    suppression: &ParsedTable,
    remove_invalid: bool,
) -> MatchResult {
    let suppressed = suppression_set(suppression);
    debug!(suppression_entries = suppressed.len(), "built suppression set");

    // Classification is embarrassingly parallel; the ordered collect keeps
    // the partition deterministic.
    let verdicts: Vec<Verdict> = contact
        .rows
        .par_iter()
        .map(|row| {
            let email = row
                .get(&contact.email_column_name)
                .map(String::as_str)
                .unwrap_or("");
            if suppressed.contains(&normalize_email(email)) {
                Verdict::Remove(RemovalReason::Suppressed)
            } else if remove_invalid && !is_valid_email(email) {
                Verdict::Remove(RemovalReason::Invalid)
            } else {
                Verdict::Keep
            }
        })
        .collect();

    let mut cleaned_rows = Vec::new();
    let mut removed_rows = Vec::new();
    for (i, (row, verdict)) in contact.rows.iter().zip(&verdicts).enumerate() {
        match verdict {
            Verdict::Keep => cleaned_rows.push(row.clone()),
            Verdict::Remove(reason) => removed_rows.push(RemovedRow {
                original_row_number: i + 2,
                email: row
                    .get(&contact.email_column_name)
                    .cloned()
                    .unwrap_or_default(),
                reason: *reason,
                row: row.clone(),
            }),
        }
    }

    let suppressed_count = removed_rows
        .iter()
        .filter(|r| r.reason == RemovalReason::Suppressed)
        .count();
    let stats = CleanStats {
        total_rows: contact.rows.len(),
        cleaned_count: cleaned_rows.len(),
        suppressed_count,
        invalid_count: removed_rows.len() - suppressed_count,
    };

    MatchResult {
        cleaned_rows,
        removed_rows,
        stats,
    }
}
