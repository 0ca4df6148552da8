use once_cell::sync::Lazy;
use regex::Regex;

/// Permissive email syntax screen: exactly one `@`, no whitespace on either
/// side of it, and a dot-separated final segment in the domain. This is a
/// cheap plausibility check, not RFC 5322 validation.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern should be valid")
});

/// Returns true if `text` looks like an email address. Empty and
/// whitespace-only input is always rejected. Runs on the trimmed text so
/// padded cells are not flagged for their padding.
pub fn is_valid_email(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    EMAIL_PATTERN.is_match(trimmed)
}

/// Trim + lowercase, for suppression-set membership only. Display output
/// always keeps the original casing.
pub fn normalize_email(text: &str) -> String {
    text.trim().to_lowercase()
}
