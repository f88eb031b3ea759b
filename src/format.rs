//! Turns statuses into IRC lines.
//!
//! Two steps: [`format_status`] builds `@<author>: <text>` with the author in
//! bold, and [`unencode`] decodes the HTML character references Twitter leaves
//! in tweet text.

use std::borrow::Cow;

use crate::twitter::Status;

/// IRC bold toggle.
pub const BOLD: char = '\x02';

/// Which path a status is being formatted for.
///
/// Pasted-link lookups collapse newlines in a plain status body to spaces;
/// statuses relayed from the live stream keep them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    /// A status relayed from the user stream.
    Stream,
    /// A status fetched because its link was pasted in a channel.
    Lookup,
}

/// Wraps `text` in IRC bold markers.
pub fn bold(text: &str) -> String {
    format!("{}{}{}", BOLD, text, BOLD)
}

/// Removes IRC bold markers.
pub fn strip_bold(text: &str) -> String {
    text.chars().filter(|c| *c != BOLD).collect()
}

/// Formats a status as a single display line.
///
/// - Plain status: `@<bold author>: <text>`
/// - Retweet: `@<bold author>: RT @<original author>: <original text>`
///
/// In [`FormatMode::Lookup`] newlines in a plain status body are replaced by
/// spaces. Retweet text is left as is on both paths.
pub fn format_status(status: &Status, mode: FormatMode) -> String {
    let text = match &status.retweeted_status {
        Some(original) => format!("RT @{}: {}", original.author.screen_name, original.body()),
        None => match mode {
            FormatMode::Stream => status.body().to_string(),
            FormatMode::Lookup => status.body().replace('\n', " "),
        },
    };
    format!("@{}: {}", bold(&status.author.screen_name), text)
}

/// Decodes HTML character references (`&amp;`, `&#39;`, ...) to literal text.
///
/// Strings without references come back unchanged. Numeric references that do
/// not name a valid character (`&#0;`, surrogates, anything past U+10FFFF)
/// decode to U+FFFD instead of failing. Unknown named references are left as is.
pub fn unencode(text: &str) -> String {
    let text = replace_invalid_numeric_references(text);
    html_escape::decode_html_entities(&text).into_owned()
}

fn replace_invalid_numeric_references(text: &str) -> Cow<'_, str> {
    if !text.contains("&#") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("&#") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match numeric_reference(candidate) {
            Some((len, None)) => {
                out.push(char::REPLACEMENT_CHARACTER);
                rest = &candidate[len..];
            }
            _ => {
                out.push_str("&#");
                rest = &candidate[2..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Parses a `&#NNN;` or `&#xHHH;` reference at the start of `text`.
///
/// Returns the reference length in bytes and the character it names, or
/// `None` when `text` does not start with a well-formed numeric reference.
fn numeric_reference(text: &str) -> Option<(usize, Option<char>)> {
    let body = text.strip_prefix("&#")?;
    let (digits, radix, marker_len) = match body.strip_prefix(|c: char| c == 'x' || c == 'X') {
        Some(hex) => (hex, 16, 1),
        None => (body, 10, 0),
    };

    let end = digits.find(';')?;
    let digits = &digits[..end];
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let named = u32::from_str_radix(digits, radix)
        .ok()
        .filter(|&value| value != 0)
        .and_then(char::from_u32);
    Some((2 + marker_len + end + 1, named))
}

/// Formats and decodes a status in one go. This is the line that gets sent.
pub fn render(status: &Status, mode: FormatMode) -> String {
    unencode(&format_status(status, mode))
}
