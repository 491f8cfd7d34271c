//! Range query helpers for prefix scans.

/// Separator between key segments. Segments themselves may not contain it,
/// so `a\0` never prefixes `a:b\0`.
pub const KEY_SEPARATOR: char = '\0';

/// Calculate the exclusive end bound for a prefix range query.
///
/// Given prefix "tenant\0", returns "tenant\x01" (next byte after the
/// separator). This allows efficient range scans: range(prefix..end_prefix)
pub fn prefix_end_bound(prefix: &str) -> String {
    if prefix.is_empty() {
        return String::new();
    }

    let mut bytes = prefix.as_bytes().to_vec();
    if let Some(last) = bytes.last_mut() {
        *last = last.saturating_add(1);
    }

    String::from_utf8(bytes).unwrap_or_else(|_| format!("{}\x7F", prefix))
}

/// Create a prefix range for redb queries.
pub fn prefix_range(prefix: &str) -> (String, String) {
    (prefix.to_string(), prefix_end_bound(prefix))
}

/// Join key segments with the separator.
pub fn compose_key(segments: &[&str]) -> String {
    let mut key = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(segment);
    }
    key
}

/// Join key segments and terminate with the separator, for prefix scans.
pub fn compose_prefix(segments: &[&str]) -> String {
    let mut prefix = compose_key(segments);
    prefix.push(KEY_SEPARATOR);
    prefix
}

/// Reject empty segments and segments containing the separator.
pub fn validate_segment(name: &str, value: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        anyhow::bail!("{} must not be empty", name);
    }
    if value.contains(KEY_SEPARATOR) {
        anyhow::bail!("{} must not contain NUL characters", name);
    }
    Ok(())
}
