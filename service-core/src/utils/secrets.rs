use subtle::ConstantTimeEq;

/// Compare a presented key with the configured one.
///
/// Empty keys never match, so an unset gate key locks the endpoint instead of
/// opening it.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    if provided_bytes.len() != expected_bytes.len() {
        return false;
    }

    provided_bytes.ct_eq(expected_bytes).into()
}

/// First `visible` characters of a secret followed by an ellipsis, for
/// diagnostics that must not reveal the whole value.
pub fn secret_prefix(secret: &str, visible: usize) -> String {
    let prefix: String = secret.chars().take(visible).collect();
    format!("{}...", prefix)
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…[truncated]", &text[..idx]),
        None => text.to_string(),
    }
}
