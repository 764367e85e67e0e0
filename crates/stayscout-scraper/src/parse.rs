//! Canonical numeric parsing for scraped free text.
//!
//! Every numeric field (rating, review count, price) goes through the same
//! rule: strip thousands separators, then take the first decimal or integer
//! substring. Scanning is done byte-wise; the input may contain arbitrary
//! UTF-8 (currency symbols, CJK labels) around the digits.

/// Returns the first decimal or integer substring of `text`, with thousands
/// separators removed.
///
/// A comma (ASCII `,` or full-width `，`) is treated as a thousands separator
/// only when it sits directly between two ASCII digits, so list punctuation
/// such as `"8.6, 120 reviews"` is left alone.
///
/// Returns `None` when `text` contains no ASCII digit.
#[must_use]
pub fn first_numeric_token(text: &str) -> Option<String> {
    let cleaned = strip_thousands_separators(text);
    let bytes = cleaned.as_bytes();

    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    // Fractional part only counts when at least one digit follows the dot.
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    Some(cleaned[start..end].to_owned())
}

/// Parses the first number in `text` as a float.
#[must_use]
pub fn parse_decimal(text: &str) -> Option<f64> {
    first_numeric_token(text)?.parse::<f64>().ok()
}

/// Parses the integer part of the first number in `text`.
///
/// `"¥1,234"` → `1234`, `"1,234.50"` → `1234`. Values that overflow `u64`
/// are treated as malformed.
#[must_use]
pub fn parse_integer(text: &str) -> Option<u64> {
    let token = first_numeric_token(text)?;
    let integer_part = token.split('.').next().unwrap_or(&token);
    integer_part.parse::<u64>().ok()
}

fn strip_thousands_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, ',' | '，') {
            let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
            let next_digit = chars.get(i + 1).is_some_and(char::is_ascii_digit);
            if prev_digit && next_digit {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
