//! The reserved in-band marker alphabet.
//!
//! The expansion pipeline communicates structure between its stages by
//! rewriting special input characters into code points which are guaranteed
//! never to occur in user input. The alphabet is carved out of the Unicode
//! "non-character" block U+FDD0..U+FDF0; see
//! <http://www.unicode.org/faq/private_use.html>. The block is split into two
//! ranges so that expansion markers and wildcard markers cannot collide.
//!
//! Every marker must be gone from a string by the time it leaves the
//! pipeline: the wildcard stage scrubs [`INTERNAL_SEPARATOR`], and each skip
//! mode rewrites its markers back to the literal characters they came from.

/// First code point of the reserved block.
pub const RESERVED_CHAR_BASE: char = '\u{FDD0}';
/// One past the last code point of the reserved block.
pub const RESERVED_CHAR_END: char = '\u{FDF0}';

const EXPAND_RESERVED_BASE: char = RESERVED_CHAR_BASE;
const EXPAND_RESERVED_END: char = char_offset(EXPAND_RESERVED_BASE, 16);
const WILDCARD_RESERVED_BASE: char = EXPAND_RESERVED_END;
const WILDCARD_RESERVED_END: char = char_offset(WILDCARD_RESERVED_BASE, 16);
// Make sure the ranges defined above don't exceed the range for
// non-characters.
const _: () = assert!(WILDCARD_RESERVED_END <= RESERVED_CHAR_END);

/// Character representing a home directory.
pub const HOME_DIRECTORY: char = char_offset(EXPAND_RESERVED_BASE, 0);
/// Character representing process expansion for %self.
pub const PROCESS_EXPAND_SELF: char = char_offset(EXPAND_RESERVED_BASE, 1);
/// Character representing variable expansion.
pub const VARIABLE_EXPAND: char = char_offset(EXPAND_RESERVED_BASE, 2);
/// Character representing variable expansion into a single element.
pub const VARIABLE_EXPAND_SINGLE: char = char_offset(EXPAND_RESERVED_BASE, 3);
/// Character representing the start of a brace group.
pub const BRACE_BEGIN: char = char_offset(EXPAND_RESERVED_BASE, 4);
/// Character representing the end of a brace group.
pub const BRACE_END: char = char_offset(EXPAND_RESERVED_BASE, 5);
/// Character representing separation between two brace elements.
pub const BRACE_SEP: char = char_offset(EXPAND_RESERVED_BASE, 6);
/// Character that takes the place of any whitespace within non-quoted text in braces.
pub const BRACE_SPACE: char = char_offset(EXPAND_RESERVED_BASE, 7);
/// Separate subtokens in a token with this character.
pub const INTERNAL_SEPARATOR: char = char_offset(EXPAND_RESERVED_BASE, 8);
/// Character representing an empty variable expansion. Only used transitively
/// while expanding variables.
pub const VARIABLE_EXPAND_EMPTY: char = char_offset(EXPAND_RESERVED_BASE, 9);

const _: () = assert!(
    EXPAND_RESERVED_END as u32 > VARIABLE_EXPAND_EMPTY as u32,
    "Characters used in expansions must stay within their reserved range"
);

/// Character representing any character except '/' (slash).
pub const ANY_CHAR: char = char_offset(WILDCARD_RESERVED_BASE, 0);
/// Character representing any character string not containing '/' (slash).
pub const ANY_STRING: char = char_offset(WILDCARD_RESERVED_BASE, 1);
/// Character representing any character string.
pub const ANY_STRING_RECURSIVE: char = char_offset(WILDCARD_RESERVED_BASE, 2);

pub const fn char_offset(base: char, offset: u32) -> char {
    match char::from_u32(base as u32 + offset) {
        Some(c) => c,
        None => panic!("not a valid char"),
    }
}

/// Return whether a code point lies inside the reserved block. Such code
/// points are rejected when they appear in user input escape sequences, so
/// that no input can forge a marker.
pub fn reserved_codepoint(c: char) -> bool {
    c >= RESERVED_CHAR_BASE && c < RESERVED_CHAR_END
}
