//! String escaping and unescaping in shell script style.
//!
//! The unescaper is the entry gate of the variable stage: with
//! [`UnescapeFlags::SPECIAL`] it rewrites quoting and expansion syntax into
//! the reserved marker alphabet of [`crate::sentinel`], which the later
//! stages consume. The escaper is its inverse and is also used to protect
//! command substitution output so that it round-trips through a subsequent
//! unescape.

use crate::expand::PROCESS_EXPAND_SELF_STR;
use crate::sentinel::{
    reserved_codepoint, ANY_CHAR, ANY_STRING, ANY_STRING_RECURSIVE, BRACE_BEGIN, BRACE_END,
    BRACE_SEP, BRACE_SPACE, HOME_DIRECTORY, INTERNAL_SEPARATOR, PROCESS_EXPAND_SELF,
    VARIABLE_EXPAND, VARIABLE_EXPAND_SINGLE,
};
use crate::wchar::prelude::*;
use bitflags::bitflags;

// Highest legal ASCII value.
const ASCII_MAX: char = 127 as char;

// Highest legal 16-bit Unicode value.
const UCS2_MAX: char = '\u{FFFF}';

// Highest legal byte value.
const BYTE_MAX: char = 0xFF as char;

bitflags! {
    /// Flags for the [`escape_string()`] function.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct EscapeFlags: u32 {
        /// Do not escape special shell syntax characters like the semicolon. Only escape
        /// non-printable characters and backslashes.
        const NO_PRINTABLES = 1 << 0;
        /// Do not try to use 'simplified' quoted escapes, and do not use empty quotes as the empty
        /// string.
        const NO_QUOTED = 1 << 1;
        /// Do not escape tildes.
        const NO_TILDE = 1 << 2;
        /// Also escape commas, so that the result is safe inside a brace group.
        const COMMA = 1 << 3;
    }
}

bitflags! {
    /// Flags for the [`unescape_string()`] function.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct UnescapeFlags: u32 {
        /// Convert special shell syntax characters into the reserved marker alphabet.
        const SPECIAL = 1 << 0;
        /// Allow incomplete escape sequences.
        const INCOMPLETE = 1 << 1;
        /// Don't handle backslash escapes.
        const NO_BACKSLASHES = 1 << 2;
    }
}

/// Replace special characters with backslash escape sequences. Newline is replaced with `\n`, etc.
pub fn escape(s: &wstr) -> WString {
    escape_string(s, EscapeFlags::default())
}

/// Escape a string in a fashion suitable for use in shell script.
pub fn escape_string(input: &wstr, flags: EscapeFlags) -> WString {
    let escape_printables = !flags.contains(EscapeFlags::NO_PRINTABLES);
    let escape_comma = flags.contains(EscapeFlags::COMMA);
    let no_quoted = flags.contains(EscapeFlags::NO_QUOTED);
    let no_tilde = flags.contains(EscapeFlags::NO_TILDE);

    let mut need_escape = false;
    let mut need_complex_escape = false;
    let mut double_quotes = 0;
    let mut single_quotes = 0;
    let mut dollars = 0;

    if !no_quoted && input.is_empty() {
        return L!("''").to_owned();
    }

    let mut out = WString::new();

    for c in input.chars() {
        match c {
            '\t' => {
                out.push_str("\\t");
                need_escape = true;
                need_complex_escape = true;
            }
            '\n' => {
                out.push_str("\\n");
                need_escape = true;
                need_complex_escape = true;
            }
            '\x08' => {
                out.push_str("\\b");
                need_escape = true;
                need_complex_escape = true;
            }
            '\r' => {
                out.push_str("\\r");
                need_escape = true;
                need_complex_escape = true;
            }
            '\x1B' => {
                out.push_str("\\e");
                need_escape = true;
                need_complex_escape = true;
            }
            '\x7F' => {
                out.push_str("\\x7f");
                need_escape = true;
                need_complex_escape = true;
            }
            '\\' | '\'' => {
                need_escape = true;
                if c == '\'' {
                    single_quotes += 1;
                }
                if escape_printables || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            ANY_CHAR => {
                out.push('?');
            }
            ANY_STRING => {
                out.push('*');
            }
            ANY_STRING_RECURSIVE => {
                out.push_str("**");
            }
            ',' => {
                if escape_comma {
                    need_escape = true;
                    out.push('\\');
                }
                out.push(c);
            }
            '&' | '$' | ' ' | '#' | '<' | '>' | '(' | ')' | '[' | ']' | '{' | '}' | '?' | '*'
            | '|' | ';' | '"' | '%' | '~' => {
                if c == '"' {
                    double_quotes += 1;
                }
                if c == '$' {
                    dollars += 1;
                }
                let char_is_normal = c == '~' && no_tilde;
                if !char_is_normal {
                    need_escape = true;
                    if escape_printables {
                        out.push('\\');
                    }
                }
                out.push(c);
            }
            '\x00'..='\x19' => {
                let cval = u32::from(c);
                need_escape = true;
                need_complex_escape = true;

                if cval < 27 && cval != 0 {
                    out.push('\\');
                    out.push('c');
                    out.push(char::from_u32(u32::from(b'a') + cval - 1).unwrap());
                    continue;
                }

                let nibble = cval % 16;
                out.push('\\');
                out.push('x');
                out.push(if cval > 15 { '1' } else { '0' });
                out.push(char::from_digit(nibble, 16).unwrap());
            }
            _ => out.push(c),
        }
    }

    // Use quoted escaping if possible, since most people find it easier to read.
    if !no_quoted && need_escape && !need_complex_escape && escape_printables {
        let quote = if single_quotes > double_quotes + dollars {
            '"'
        } else {
            '\''
        };
        out.clear();
        out.reserve(2 + input.len());
        out.push(quote);
        out.push_utfstr(&escape_string_with_quote(input, quote));
        out.push(quote);
    }

    out
}

/// Escape a string for splicing between quote characters of the given kind. A few characters
/// cannot be represented inside quotes, e.g. newlines; for those the quote is terminated, the
/// character escaped, and the quote reopened.
fn escape_string_with_quote(cmd: &wstr, quote: char) -> WString {
    let mut result = WString::new();
    result.reserve(cmd.len());
    for c in cmd.chars() {
        match c {
            '\n' => {
                for c in [quote, '\\', 'n', quote] {
                    result.push(c);
                }
            }
            '\t' => {
                for c in [quote, '\\', 't', quote] {
                    result.push(c);
                }
            }
            '\x08' => {
                for c in [quote, '\\', 'b', quote] {
                    result.push(c);
                }
            }
            '\r' => {
                for c in [quote, '\\', 'r', quote] {
                    result.push(c);
                }
            }
            '\\' => result.push_str("\\\\"),
            '$' => {
                if quote == '"' {
                    result.push('\\');
                }
                result.push('$');
            }
            _ => {
                if c == quote {
                    result.push('\\');
                }
                result.push(c);
            }
        }
    }
    result
}

/// Escape a string by wrapping it in single quotes, escaping only backslashes and single quotes.
/// This is the minimal escaping used when rewriting login-shell command lines, and unescaping the
/// result yields the input unchanged.
pub fn escape_single_quoted(s: &wstr) -> WString {
    let mut result = WString::with_capacity(s.len() + 2);
    result.push('\'');
    for c in s.chars() {
        if c == '\\' || c == '\'' {
            result.push('\\');
        }
        result.push(c);
    }
    result.push('\'');
    result
}

/// Returns the unescaped version of input, or None on error.
pub fn unescape_string(input: &wstr, flags: UnescapeFlags) -> Option<WString> {
    let mut result = WString::new();
    result.reserve(input.len());

    let unescape_special = flags.contains(UnescapeFlags::SPECIAL);
    let allow_incomplete = flags.contains(UnescapeFlags::INCOMPLETE);
    let ignore_backslashes = flags.contains(UnescapeFlags::NO_BACKSLASHES);

    // The positions of open braces.
    let mut braces = vec![];
    // The positions of variable expansions or brace ","s.
    // We only read braces as expanders if there's a variable expansion or "," in them.
    let mut vars_or_seps = vec![];
    let mut brace_count = 0;

    let mut errored = false;
    #[derive(PartialEq, Eq)]
    enum Mode {
        Unquoted,
        SingleQuotes,
        DoubleQuotes,
    }
    let mut mode = Mode::Unquoted;

    let mut input_position = 0;
    while input_position < input.len() && !errored {
        let c = input.char_at(input_position);
        // Here's the character we'll append to result, or None to suppress it.
        let mut to_append_or_none = Some(c);
        if mode == Mode::Unquoted {
            match c {
                '\\' => {
                    if !ignore_backslashes {
                        // Backslashes (escapes) are complicated and may result in errors, or
                        // appending INTERNAL_SEPARATORs, so we have to handle them specially.
                        if let Some(escape_chars) = read_unquoted_escape(
                            input.slice_from(input_position),
                            &mut result,
                            allow_incomplete,
                            unescape_special,
                        ) {
                            // Skip over the characters we read, minus one because the outer loop
                            // will increment it.
                            assert!(escape_chars > 0);
                            input_position += escape_chars - 1;
                        } else {
                            errored = true;
                        }
                        // We've already appended, don't append anything else.
                        to_append_or_none = None;
                    }
                }
                '~' => {
                    if unescape_special && input_position == 0 {
                        to_append_or_none = Some(HOME_DIRECTORY);
                    }
                }
                '%' => {
                    // Note that this only recognizes %self if the string is literally %self.
                    // %self/foo will NOT match this.
                    if unescape_special && input_position == 0 && input == PROCESS_EXPAND_SELF_STR {
                        to_append_or_none = Some(PROCESS_EXPAND_SELF);
                        input_position += PROCESS_EXPAND_SELF_STR.len() - 1; // skip over 'self's
                    }
                }
                '*' => {
                    if unescape_special {
                        // In general, this is ANY_STRING. But if the last appended char is
                        // ANY_STRING, delete the last char and store ANY_STRING_RECURSIVE to
                        // reflect the fact that ** is the recursive wildcard.
                        if result.chars().next_back() == Some(ANY_STRING) {
                            assert!(!result.is_empty());
                            result.truncate(result.len() - 1);
                            to_append_or_none = Some(ANY_STRING_RECURSIVE);
                        } else {
                            to_append_or_none = Some(ANY_STRING);
                        }
                    }
                }
                '?' => {
                    if unescape_special {
                        to_append_or_none = Some(ANY_CHAR);
                    }
                }
                '$' => {
                    if unescape_special {
                        to_append_or_none = Some(VARIABLE_EXPAND);
                        vars_or_seps.push(input_position);
                    }
                }
                '{' => {
                    if unescape_special {
                        brace_count += 1;
                        to_append_or_none = Some(BRACE_BEGIN);
                        // We need to store where the brace *ends up* in the output.
                        braces.push(result.len());
                    }
                }
                '}' => {
                    if unescape_special {
                        // The completion machinery sometimes hands us partial tokens, so a
                        // closing brace may arrive without its opener.
                        brace_count -= 1;
                        to_append_or_none = Some(BRACE_END);
                        if let Some(brace) = braces.pop() {
                            // A brace group with zero or one items is read as literal input, so
                            // that `{}` and `{single}` don't silently expand.
                            if vars_or_seps.last().map(|i| *i < brace).unwrap_or(true) {
                                result.as_char_slice_mut()[brace] = '{';
                                // We also need to turn all spaces back.
                                for i in brace + 1..result.len() {
                                    if result.char_at(i) == BRACE_SPACE {
                                        result.as_char_slice_mut()[i] = ' ';
                                    }
                                }
                                to_append_or_none = Some('}');
                            }
                            // Remove all seps inside the current brace pair, so if we have a
                            // surrounding pair we only get seps inside *that*.
                            if !vars_or_seps.is_empty() {
                                while vars_or_seps.last().map(|i| *i > brace).unwrap_or_default() {
                                    vars_or_seps.pop();
                                }
                            }
                        }
                    }
                }
                ',' => {
                    if unescape_special && brace_count > 0 {
                        to_append_or_none = Some(BRACE_SEP);
                        vars_or_seps.push(input_position);
                    }
                }
                ' ' => {
                    if unescape_special && brace_count > 0 {
                        to_append_or_none = Some(BRACE_SPACE);
                    }
                }
                '\'' => {
                    mode = Mode::SingleQuotes;
                    to_append_or_none = if unescape_special {
                        Some(INTERNAL_SEPARATOR)
                    } else {
                        None
                    };
                }
                '"' => {
                    mode = Mode::DoubleQuotes;
                    to_append_or_none = if unescape_special {
                        Some(INTERNAL_SEPARATOR)
                    } else {
                        None
                    };
                }
                _ => (),
            }
        } else if mode == Mode::SingleQuotes {
            if c == '\\' {
                // A backslash may or may not escape something in single quotes.
                match input.char_at(input_position + 1) {
                    '\\' | '\'' => {
                        to_append_or_none = Some(input.char_at(input_position + 1));
                        input_position += 1; // skip over the backslash
                    }
                    '\0' => {
                        if !allow_incomplete {
                            errored = true;
                        } else {
                            input_position += 1; // skip over the backslash
                            to_append_or_none = Some('\\');
                        }
                    }
                    _ => {
                        // Literal backslash that doesn't escape anything! Leave things alone; we'll
                        // append the backslash itself.
                    }
                }
            } else if c == '\'' {
                to_append_or_none = if unescape_special {
                    Some(INTERNAL_SEPARATOR)
                } else {
                    None
                };
                mode = Mode::Unquoted;
            }
        } else if mode == Mode::DoubleQuotes {
            match c {
                '"' => {
                    mode = Mode::Unquoted;
                    to_append_or_none = if unescape_special {
                        Some(INTERNAL_SEPARATOR)
                    } else {
                        None
                    };
                }
                '\\' => {
                    match input.char_at(input_position + 1) {
                        '\0' => {
                            if !allow_incomplete {
                                errored = true;
                            } else {
                                to_append_or_none = Some('\0');
                            }
                        }
                        '\\' | '$' | '"' => {
                            to_append_or_none = Some(input.char_at(input_position + 1));
                            input_position += 1; // skip over the backslash
                        }
                        '\n' => {
                            // Swallow the newline.
                            to_append_or_none = None;
                            input_position += 1; // skip over the backslash
                        }
                        _ => {
                            // Literal backslash that doesn't escape anything! Leave things alone;
                            // we'll append the backslash itself.
                        }
                    }
                }
                '$' => {
                    if unescape_special {
                        to_append_or_none = Some(VARIABLE_EXPAND_SINGLE);
                        vars_or_seps.push(input_position);
                    }
                }
                _ => (),
            }
        }

        // Now maybe append the char.
        if let Some(c) = to_append_or_none {
            result.push(c);
        }
        input_position += 1;
    }

    if errored {
        return None;
    }
    Some(result)
}

/// Reads an unquoted escape sequence beginning at the backslash at the start of `input`, appending
/// the unescaped characters to `result`. Returns the number of characters consumed, or None on
/// error.
fn read_unquoted_escape(
    input: &wstr,
    result: &mut WString,
    allow_incomplete: bool,
    unescape_special: bool,
) -> Option<usize> {
    assert!(input.char_at(0) == '\\', "not an escape");

    // Here's the character we'll ultimately append, or None. Note that '\0' is a
    // valid thing to append.
    let mut result_char_or_none: Option<char> = None;

    let mut errored = false;
    let mut in_pos = 1; // in_pos always tracks the next character to read (and therefore the number
                        // of characters read so far)

    let c = input.char_at(in_pos);
    in_pos += 1;
    match c {
        // A null character after a backslash is an error.
        '\0' => {
            // Adjust in_pos to only include the backslash.
            in_pos -= 1;

            // It's an error, unless we're allowing incomplete escapes.
            if !allow_incomplete {
                errored = true;
            }
        }
        // Numeric escape sequences. No prefix means octal escape, otherwise hexadecimal.
        '0'..='7' | 'u' | 'U' | 'x' | 'X' => {
            let mut res: u64 = 0;
            let mut chars = 2;
            let mut base = 16;
            let mut max_val = ASCII_MAX;

            match c {
                'u' => {
                    chars = 4;
                    max_val = UCS2_MAX;
                }
                'U' => {
                    chars = 8;
                    // Don't exceed the largest Unicode code point.
                    max_val = char::MAX;
                }
                'x' | 'X' => {
                    max_val = BYTE_MAX;
                }
                _ => {
                    base = 8;
                    chars = 3;
                    // Note that in_pos currently is just after the first post-backslash
                    // character; we want to start our escape from there.
                    in_pos -= 1;
                }
            }

            for i in 0..chars {
                let Some(d) = input.char_at(in_pos).to_digit(base) else {
                    // If we have no digit, this is a tokenizer error.
                    if i == 0 {
                        errored = true;
                    }
                    break;
                };

                res = (res * u64::from(base)) + u64::from(d);
                in_pos += 1;
            }

            if !errored && res <= u64::from(max_val) {
                result_char_or_none =
                    Some(char::from_u32(u32::try_from(res).unwrap()).unwrap_or('\u{FFFD}'));
            } else {
                errored = true;
            }
        }
        // \a means bell (alert).
        'a' => {
            result_char_or_none = Some('\x07');
        }
        // \b means backspace.
        'b' => {
            result_char_or_none = Some('\x08');
        }
        // \cX means control sequence X.
        'c' => {
            let sequence_char = u32::from(input.char_at(in_pos));
            in_pos += 1;
            if sequence_char >= u32::from('a') && sequence_char <= u32::from('a') + 32 {
                result_char_or_none = Some(char::from_u32(sequence_char - u32::from('a') + 1).unwrap());
            } else if sequence_char >= u32::from('A') && sequence_char <= u32::from('A') + 32 {
                result_char_or_none = Some(char::from_u32(sequence_char - u32::from('A') + 1).unwrap());
            } else {
                errored = true;
            }
        }
        // \x1B means escape.
        'e' => {
            result_char_or_none = Some('\x1B');
        }
        // \f means form feed.
        'f' => {
            result_char_or_none = Some('\x0C');
        }
        // \n means newline.
        'n' => {
            result_char_or_none = Some('\n');
        }
        // \r means carriage return.
        'r' => {
            result_char_or_none = Some('\x0D');
        }
        // \t means tab.
        't' => {
            result_char_or_none = Some('\t');
        }
        // \v means vertical tab.
        'v' => {
            result_char_or_none = Some('\x0B');
        }
        // If a backslash is followed by an actual newline, swallow them both.
        '\n' => {
            result_char_or_none = None;
        }
        _ => {
            if unescape_special {
                result.push(INTERNAL_SEPARATOR);
            }
            result_char_or_none = Some(c);
        }
    }

    if errored {
        return None;
    }

    if let Some(c) = result_char_or_none {
        if reserved_codepoint(c) {
            return None;
        }
        result.push(c);
    }

    Some(in_pos)
}

/// Test if the given character is valid in a variable name.
pub fn valid_var_name_char(chr: char) -> bool {
    chr.is_alphanumeric() || chr == '_'
}

/// Test if the given string is a valid variable name.
pub fn valid_var_name(s: &wstr) -> bool {
    !s.is_empty() && s.chars().all(valid_var_name_char)
}
