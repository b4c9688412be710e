// src/utils/text.rs

//! Byte-budget helpers for UTF-8 text.

/// Truncate `text` to at most `max_bytes` bytes without splitting a character.
///
/// The cut point is moved backwards (at most 3 bytes, the longest UTF-8
/// continuation run) until it lands on a character boundary.
///
/// # Examples
/// ```
/// use trendline::utils::text::truncate_to_bytes;
///
/// assert_eq!(truncate_to_bytes("héllo", 2), "h");
/// assert_eq!(truncate_to_bytes("héllo", 3), "hé");
/// ```
pub fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let mut end = max_bytes;
    for _ in 0..4 {
        if text.is_char_boundary(end) {
            return &text[..end];
        }
        end -= 1;
    }

    ""
}
