pub const MAX_COMMIT_MESSAGE_LEN: usize = 72;

/// Cuts a message to [`MAX_COMMIT_MESSAGE_LEN`] characters followed by `...`.
#[must_use]
pub fn truncate_commit_message(message: &str) -> String {
    if message.chars().count() <= MAX_COMMIT_MESSAGE_LEN {
        return message.to_string();
    }

    let mut truncated: String = message.chars().take(MAX_COMMIT_MESSAGE_LEN).collect();
    truncated.push_str("...");
    truncated
}

/// Strips control characters other than newline and tab, trims, and truncates.
#[must_use]
pub fn sanitize_commit_message(message: &str) -> String {
    let cleaned: String = message
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    truncate_commit_message(cleaned.trim())
}

/// Uses the caller's message when it has content, otherwise describes the change.
#[must_use]
pub fn make_commit_message(raw: Option<&str>, username: &str, files: &[&str]) -> String {
    let sanitized = raw.map(sanitize_commit_message).unwrap_or_default();
    if !sanitized.is_empty() {
        return sanitized;
    }

    truncate_commit_message(&format!("User {username} modified file(s) {}", files.join(",")))
}
