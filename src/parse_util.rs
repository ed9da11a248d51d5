//! Utilities for locating structure inside a raw argument token.

use crate::common::valid_var_name;
use crate::parse_constants::{
    ParseError, ParseErrorCode, ParseErrorList, ERROR_BAD_VAR_CHAR1, ERROR_BRACKETED_VARIABLE1,
    ERROR_BRACKETED_VARIABLE_QUOTED1, ERROR_NOT_ARGV_AT, ERROR_NOT_ARGV_COUNT, ERROR_NOT_ARGV_STAR,
    ERROR_NOT_PID, ERROR_NOT_STATUS, ERROR_NO_VAR_NAME,
};
use crate::sentinel::{
    ANY_CHAR, ANY_STRING, ANY_STRING_RECURSIVE, BRACE_BEGIN, BRACE_END, BRACE_SEP,
    INTERNAL_SEPARATOR, VARIABLE_EXPAND, VARIABLE_EXPAND_EMPTY, VARIABLE_EXPAND_SINGLE,
};
use crate::wchar::prelude::*;
use crate::wcstringutil::truncate;
use fish_printf::sprintf;
use std::ops::Range;

/// Max length of a variable name shown in an error message before it is truncated.
const VAR_ERR_LEN: usize = 16;

/// The location of a command substitution: the range from the opening parenthesis through the
/// closing one, or through the end of the string if the closer is missing.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct Parentheses {
    range: Range<usize>,
    num_closing: usize,
}

impl Parentheses {
    pub fn start(&self) -> usize {
        self.range.start
    }
    pub fn end(&self) -> usize {
        self.range.end
    }
    pub fn command(&self) -> Range<usize> {
        self.range.start + 1..self.range.end - self.num_closing
    }
}

#[derive(Eq, PartialEq, Debug)]
pub enum MaybeParentheses {
    Error,
    None,
    CommandSubstitution(Parentheses),
}

/// Find the first command substitution at or after `*inout_cursor_offset`.
///
/// On a hit, `*inout_cursor_offset` is advanced to just past the closing paren, so repeated calls
/// iterate over all substitutions. `accept_incomplete` permits a missing closing parenthesis; the
/// returned range then runs through the end of the string.
///
/// Backslash escapes and quoted text are skipped; a quoted or escaped parenthesis never opens or
/// closes a substitution.
pub fn parse_util_locate_cmdsubst_range(
    s: &wstr,
    inout_cursor_offset: &mut usize,
    accept_incomplete: bool,
) -> MaybeParentheses {
    // Nothing to do if the offset is at or past the end of the string.
    if *inout_cursor_offset >= s.len() {
        return MaybeParentheses::None;
    }

    let ret = locate_cmdsub(s, *inout_cursor_offset, accept_incomplete);
    if let MaybeParentheses::CommandSubstitution(parens) = &ret {
        *inout_cursor_offset = parens.end();
    }
    ret
}

fn locate_cmdsub(input: &wstr, cursor: usize, allow_incomplete: bool) -> MaybeParentheses {
    let input = input.as_char_slice();

    let mut escaped = false;
    let mut syntax_error = false;
    let mut paren_count = 0;
    let mut paren_begin = None;
    let mut paren_end = None;

    let mut pos = cursor;
    while pos < input.len() {
        let c = input[pos];
        if escaped {
            escaped = false;
        } else if c == '\'' || c == '"' {
            match quote_end(input.into(), pos, c) {
                Some(q_end) => pos = q_end,
                None => break,
            }
        } else if c == '\\' {
            escaped = true;
        } else if c == '(' {
            if paren_count == 0 && paren_begin.is_none() {
                paren_begin = Some(pos);
            }
            paren_count += 1;
        } else if c == ')' {
            paren_count -= 1;
            if paren_count == 0 && paren_end.is_none() {
                paren_end = Some(pos);
                break;
            }
            if paren_count < 0 {
                syntax_error = true;
                break;
            }
        }
        pos += 1;
    }

    syntax_error |= paren_count < 0;
    syntax_error |= paren_count > 0 && !allow_incomplete;

    if syntax_error {
        return MaybeParentheses::Error;
    }

    let Some(paren_begin) = paren_begin else {
        return MaybeParentheses::None;
    };

    let end = if paren_count != 0 {
        input.len()
    } else {
        paren_end.unwrap() + 1
    };

    let parens = Parentheses {
        range: paren_begin..end,
        num_closing: if paren_count == 0 { 1 } else { 0 },
    };

    MaybeParentheses::CommandSubstitution(parens)
}

/// Return the index of the closing quote matching the quote character at `pos`, respecting
/// backslash escapes, or None if the quote is unterminated.
pub fn quote_end(s: &wstr, mut pos: usize, quote: char) -> Option<usize> {
    loop {
        pos += 1;
        let c = s.try_char_at(pos)?;
        if c == '\\' {
            pos += 1;
        } else if c == quote {
            return Some(pos);
        } else if c == '\0' {
            return None;
        }
    }
}

fn append_syntax_error(
    errors: &mut ParseErrorList,
    source_start: usize,
    source_length: usize,
    text: WString,
) {
    errors.push(ParseError {
        text,
        code: ParseErrorCode::syntax,
        source_start,
        source_length,
    });
}

/// Given a token where a `$` (in marker form) was not followed by a valid variable name, append
/// the most helpful error we can: a hint for `${...}` bracketing, a migration hint for `$?`, `$#`,
/// `$@`, `$*` and `$$`, or the plain "expected a variable name" error.
///
/// `dollar_pos` is the position of the marker within `token`; `global_token_pos` is the offset of
/// the token within the user's input, for error locations.
pub fn parse_util_expand_variable_error(
    token: &wstr,
    global_token_pos: usize,
    dollar_pos: usize,
    errors: &mut ParseErrorList,
) {
    // Note that dollar_pos is the index of VARIABLE_EXPAND or VARIABLE_EXPAND_SINGLE, not a
    // literal dollar sign.
    let token = token.as_char_slice();
    let double_quotes = token[dollar_pos] == VARIABLE_EXPAND_SINGLE;
    let global_dollar_pos = global_token_pos + dollar_pos;
    let global_after_dollar_pos = global_dollar_pos + 1;
    let char_after_dollar = token.get(dollar_pos + 1).copied().unwrap_or('\0');

    match char_after_dollar {
        BRACE_BEGIN | '{' => {
            // The BRACE_BEGIN is for unquoted, the { is for quoted. Anyways we have (possibly
            // quoted) ${. See if we have a }, and the stuff in between is variable material. If
            // so, report a bracket error. Otherwise just complain about the ${.
            let mut looks_like_variable = false;
            let closing_bracket = token
                .iter()
                .skip(dollar_pos + 2)
                .position(|c| {
                    *c == if char_after_dollar == '{' {
                        '}'
                    } else {
                        BRACE_END
                    }
                })
                .map(|p| p + dollar_pos + 2);
            let mut var_name = L!("");
            if let Some(var_end) = closing_bracket {
                let var_start = dollar_pos + 2;
                var_name = (&token[var_start..var_end]).into();
                looks_like_variable = valid_var_name(var_name);
            }
            if looks_like_variable {
                let msg: WString = if double_quotes {
                    sprintf!(
                        ERROR_BRACKETED_VARIABLE_QUOTED1,
                        truncate(var_name, VAR_ERR_LEN)
                    )
                    .into()
                } else {
                    sprintf!(ERROR_BRACKETED_VARIABLE1, truncate(var_name, VAR_ERR_LEN)).into()
                };
                append_syntax_error(errors, global_after_dollar_pos, 1, msg);
            } else {
                append_syntax_error(
                    errors,
                    global_after_dollar_pos,
                    1,
                    sprintf!(ERROR_BAD_VAR_CHAR1, '{').into(),
                );
            }
        }
        INTERNAL_SEPARATOR => {
            // e.g.: echo foo"$"baz
            // These are only ever quotes, not command substitutions. Command substitutions are
            // handled earlier.
            append_syntax_error(
                errors,
                global_dollar_pos,
                1,
                ERROR_NO_VAR_NAME.to_owned(),
            );
        }
        '\0' => {
            append_syntax_error(
                errors,
                global_dollar_pos,
                1,
                ERROR_NO_VAR_NAME.to_owned(),
            );
        }
        _ => {
            let mut token_stop_char = char_after_dollar;
            // Unescape the wildcard markers so the error shows what the user typed.
            if token_stop_char == ANY_CHAR {
                token_stop_char = '?';
            } else if [ANY_STRING, ANY_STRING_RECURSIVE].contains(&token_stop_char) {
                token_stop_char = '*';
            }

            append_syntax_error(
                errors,
                global_after_dollar_pos,
                1,
                error_for_character(token_stop_char),
            );
        }
    }
}

fn error_for_character(c: char) -> WString {
    match c {
        '?' => ERROR_NOT_STATUS.to_owned(),
        '#' => ERROR_NOT_ARGV_COUNT.to_owned(),
        '@' => ERROR_NOT_ARGV_AT.to_owned(),
        '*' => ERROR_NOT_ARGV_STAR.to_owned(),
        _ if [
            '$',
            VARIABLE_EXPAND,
            VARIABLE_EXPAND_SINGLE,
            VARIABLE_EXPAND_EMPTY,
        ]
        .contains(&c) =>
        {
            ERROR_NOT_PID.to_owned()
        }
        _ if [BRACE_END, '}', ',', BRACE_SEP].contains(&c) => {
            ERROR_NO_VAR_NAME.to_owned()
        }
        _ => sprintf!(ERROR_BAD_VAR_CHAR1, c).into(),
    }
}
