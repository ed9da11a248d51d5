//! Helper functions for working with wide strings.

use crate::wchar::prelude::*;

/// Joins strings with a separator.
/// This supports both `&[&wstr]` and `&[WString]`.
pub fn join_strings<S: AsRef<wstr>>(strs: &[S], sep: char) -> WString {
    if strs.is_empty() {
        return WString::new();
    }
    let capacity = strs.iter().fold(0, |acc, s| acc + s.as_ref().len()) + strs.len() - 1;
    let mut result = WString::with_capacity(capacity);
    for (i, s) in strs.iter().enumerate() {
        if i > 0 {
            result.push(sep);
        }
        result.push_utfstr(s.as_ref());
    }
    result
}

/// Trim any of the given characters (whitespace by default) from both margins of the string.
pub fn trim(input: WString, any_of: Option<&wstr>) -> WString {
    let any_of = any_of.unwrap_or(L!("\t\x0B \r\n"));
    let mut result = input;
    let Some(suffix) = result.chars().rposition(|c| !any_of.contains(c)) else {
        return WString::new();
    };
    result.truncate(suffix + 1);

    let prefix = result
        .chars()
        .position(|c| !any_of.contains(c))
        .expect("Should have one non-trimmed character");
    result.split_off(prefix)
}

/// Truncate a string to at most `max_len` characters, marking the cut with an ellipsis.
pub fn truncate(input: &wstr, max_len: usize) -> WString {
    if input.len() <= max_len {
        return input.to_owned();
    }
    if max_len == 0 {
        return WString::new();
    }
    let mut output = input[..max_len - 1].to_owned();
    output.push('…');
    output
}
