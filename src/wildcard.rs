//! Wildcard markers and the interface to the filesystem matcher.

pub use crate::sentinel::{ANY_CHAR, ANY_STRING, ANY_STRING_RECURSIVE};
use crate::complete::CompletionReceiver;
use crate::expand::ExpandFlags;
use crate::wchar::prelude::*;

/// The outcome of matching one pattern against one working directory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WildcardResult {
    /// The wildcard did not match.
    NoMatch,
    /// The wildcard did match.
    Match,
    /// Expansion was cancelled (e.g. control-C).
    Cancel,
    /// Expansion produced too many results.
    Overflow,
}

/// Matches a wildcard pattern against the filesystem.
///
/// The pattern contains wildcard markers ([`ANY_CHAR`], [`ANY_STRING`],
/// [`ANY_STRING_RECURSIVE`]) rather than literal `?` and `*`, so that escaped wildcards in the
/// user's input stay literal. An empty working directory means "absolute paths only, no cwd
/// prefix". The matcher may perform filesystem I/O and is the only source of filesystem state in
/// an expansion.
pub trait WildcardMatcher {
    fn expand(
        &self,
        wc: &wstr,
        working_directory: &wstr,
        flags: ExpandFlags,
        out: &mut CompletionReceiver,
    ) -> WildcardResult;
}

/// Return whether the string contains internal wildcard marker characters.
pub fn wildcard_has_internal(s: impl AsRef<wstr>) -> bool {
    s.as_ref()
        .chars()
        .any(|c| matches!(c, ANY_CHAR | ANY_STRING | ANY_STRING_RECURSIVE))
}
