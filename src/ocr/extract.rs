use regex::Regex;
use std::sync::OnceLock;

/// ASCII digits only. `\d` would also match other Unicode decimal digits.
const DIGIT_PATTERN: &str = r"[0-9]";

fn digit_regex() -> Option<&'static Regex> {
    static DIGIT: OnceLock<Option<Regex>> = OnceLock::new();
    DIGIT.get_or_init(|| Regex::new(DIGIT_PATTERN).ok()).as_ref()
}

/// Returns the first ASCII digit in a recognizer response, if any.
pub fn first_digit(text: &str) -> Option<char> {
    digit_regex()?
        .find(text)
        .and_then(|m| m.as_str().chars().next())
}

/// True if `text` is exactly `len` ASCII digits.
pub fn is_exact_digits(text: &str, len: usize) -> bool {
    text.len() == len && text.bytes().all(|b| b.is_ascii_digit())
}

/// True if the token is non-empty and made only of ASCII digits.
pub fn is_digit_token(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}
