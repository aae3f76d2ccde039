/// Heuristic extraction quality of one page, 0.0 (garbage) to 1.0 (clean).
///
/// Each detected artifact costs a quarter point: runs of double spaces, broken
/// hyphenation, missing sentence punctuation and stray non-ASCII symbols.
pub(crate) fn page_quality(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let length = trimmed.chars().count() as f64;
    let words = trimmed.split_whitespace().count() as f64;
    let mut issues = 0u8;

    if trimmed.matches("  ").count() as f64 > length * 0.1 {
        issues += 1;
    }
    if trimmed.matches("- ").count() as f64 > length * 0.05 {
        issues += 1;
    }
    if (trimmed.matches('.').count() as f64) < words * 0.1 {
        issues += 1;
    }
    let garbled = trimmed
        .chars()
        .filter(|ch| !ch.is_ascii() && !ch.is_alphabetic())
        .count() as f64;
    if garbled > length * 0.1 {
        issues += 1;
    }

    (1.0 - f64::from(issues) * 0.25).clamp(0.0, 1.0)
}

/// A document with no letters or digits at all cannot be analysed.
pub(crate) fn is_readable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}
