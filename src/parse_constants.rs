//! Error records produced while parsing or expanding shell input.

use crate::wchar::prelude::*;

/// Used to denote a missing source offset.
pub const SOURCE_LOCATION_UNKNOWN: usize = usize::MAX;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ParseErrorCode {
    #[default]
    none,
    /// Malformed input, e.g. mismatched braces or a bad slice index.
    syntax,
    /// A failed command substitution.
    cmdsubst,
    /// Unclassified error types, e.g. an expansion that produced too many results.
    generic,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParseError {
    /// Text of the error.
    pub text: WString,
    /// Code for the error.
    pub code: ParseErrorCode,
    /// Offset and length of the token in the source code that triggered this error.
    pub source_start: usize,
    pub source_length: usize,
}

pub type ParseErrorList = Vec<ParseError>;

impl ParseError {
    /// Return a string describing the error, suitable for presentation to the user. If
    /// `is_interactive` is true, the offending line with a caret is omitted for errors at the
    /// start of input, because there it's obvious.
    pub fn describe(&self, src: &wstr, is_interactive: bool) -> WString {
        let mut result = self.text.clone();

        let mut start = self.source_start;
        let mut len = self.source_length;
        if start >= src.len() {
            // If we are past the source, we clamp it to the end.
            start = src.len().saturating_sub(1);
            len = 0;
        }
        if start + len > src.len() {
            len = src.len() - start;
        }

        // Don't include the caret and line if we're interactive and this is the first line,
        // because then it's obvious.
        if is_interactive && start == 0 {
            return result;
        }
        if src.is_empty() {
            return result;
        }

        // Locate the beginning of this line of source. Look for a newline prior to source_start.
        // If we don't find one, start at the beginning of the string; otherwise start one past
        // the newline.
        let prefix = &src.as_char_slice()[..start];
        let line_start = prefix
            .iter()
            .rposition(|c| *c == '\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);

        // Look for the newline after the source range. If the source range itself includes a
        // newline, that's the one we want, so start just before the end of the range.
        let last_char_in_range = if len == 0 { start } else { start + len - 1 };
        let line_end = src.as_char_slice()[last_char_in_range..]
            .iter()
            .position(|c| *c == '\n')
            .map(|pos| pos + last_char_in_range)
            .unwrap_or(src.len());
        assert!(line_end >= line_start);
        assert!(start >= line_start);

        // Append the line of text.
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_utfstr(&src[line_start..line_end]);

        // Append the caret line.
        result.push('\n');
        for _ in 0..(start - line_start) {
            result.push(' ');
        }
        result.push('^');
        if len > 1 {
            for _ in 0..(len - 2) {
                result.push('~');
            }
            result.push('^');
        }
        result
    }
}

// Error messages for the variable-expansion diagnostics.
pub const ERROR_NO_VAR_NAME: &wstr = L!("Expected a variable name after this $.");
pub const ERROR_BAD_VAR_CHAR1: &wstr = L!("$%lc is not a valid variable name.");
pub const ERROR_BRACKETED_VARIABLE1: &wstr =
    L!("Variables cannot be bracketed. Please use {$%ls} instead.");
pub const ERROR_BRACKETED_VARIABLE_QUOTED1: &wstr =
    L!("Variables cannot be bracketed. Please use \"$%ls\" instead.");
pub const ERROR_NOT_STATUS: &wstr = L!("$? is not the exit status. Please use $status instead.");
pub const ERROR_NOT_PID: &wstr = L!("$$ is not the pid. Please use %self instead.");
pub const ERROR_NOT_ARGV_COUNT: &wstr = L!("$# is not supported. Please use 'count $argv' instead.");
pub const ERROR_NOT_ARGV_AT: &wstr = L!("$@ is not supported. Please use $argv instead.");
pub const ERROR_NOT_ARGV_STAR: &wstr = L!("$* is not supported. Please use $argv instead.");
