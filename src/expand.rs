//! String expansion functions. These functions perform several kinds of parameter expansion:
//! command substitution, variable substitution, brace expansion, home directory and %self
//! expansion, and wildcard expansion.
//!
//! Expansion is a pipeline of five stages. Each stage is a pure function from one in-flight
//! string to a list of output completions; the driver folds the stages over the working list in
//! fixed order, so a stage never sees state other than its input string, the flags, and the
//! collaborators in the operation context.

use crate::common::{escape_string, unescape_string, valid_var_name_char, EscapeFlags, UnescapeFlags};
use crate::complete::{CompleteFlags, Completion, CompletionList, CompletionReceiver};
use crate::env::{EnvVar, Environment};
use crate::exec::{
    STATUS_CMD_UNKNOWN, STATUS_EXPAND_ERROR, STATUS_ILLEGAL_CMD, STATUS_INVALID_ARGS,
    STATUS_NOT_EXECUTABLE, STATUS_READ_TOO_MUCH, STATUS_UNMATCHED_WILDCARD,
};
use crate::operation_context::OperationContext;
use crate::parse_constants::{ParseError, ParseErrorCode, ParseErrorList, SOURCE_LOCATION_UNKNOWN};
use crate::parse_util::{
    parse_util_expand_variable_error, parse_util_locate_cmdsubst_range, MaybeParentheses,
};
use crate::path::path_apply_working_directory;
use crate::users::UserDirs;
use crate::util::{getpid, wcsfilecmp_glob};
use crate::wchar::prelude::*;
use crate::wcstoi::{wcstoi_partial, Options};
use crate::wcstringutil::{join_strings, trim};
use crate::wildcard::{wildcard_has_internal, WildcardResult};
use bitflags::bitflags;

pub use crate::sentinel::{
    ANY_CHAR, ANY_STRING, ANY_STRING_RECURSIVE, BRACE_BEGIN, BRACE_END, BRACE_SEP, BRACE_SPACE,
    HOME_DIRECTORY, INTERNAL_SEPARATOR, PROCESS_EXPAND_SELF, VARIABLE_EXPAND,
    VARIABLE_EXPAND_EMPTY, VARIABLE_EXPAND_SINGLE,
};

bitflags! {
    /// Set of flags controlling expansions.
    #[derive(Copy, Clone, Default)]
    pub struct ExpandFlags : u16 {
        /// The expansion is being done for tab or auto completions. Returned completions may have
        /// the wildcard as a prefix instead of a match.
        const FOR_COMPLETIONS = 1 << 0;
        /// Fail expansion if there is a command substitution.
        const SKIP_CMDSUBST = 1 << 1;
        /// Skip variable expansion.
        const SKIP_VARIABLES = 1 << 2;
        /// Skip wildcard expansion.
        const SKIP_WILDCARDS = 1 << 3;
        /// Skip home directory expansion, and leave the tilde restoration of completions alone.
        const SKIP_HOME_DIRECTORIES = 1 << 4;
        /// Skip job expansion. Job expansion itself is historic; the flag is accepted for caller
        /// compatibility and no stage consumes it.
        const SKIP_JOBS = 1 << 5;
        /// Only match files that are executable by the current user.
        const EXECUTABLES_ONLY = 1 << 6;
        /// Do not generate descriptions for the produced completions.
        const NO_DESCRIPTIONS = 1 << 7;
        /// Do expansions specifically to support cd. This means using CDPATH as a list of
        /// potential working directories.
        const SPECIAL_FOR_CD = 1 << 8;
        /// Do expansions specifically to support external command completions. This means using
        /// PATH as a list of potential working directories.
        const SPECIAL_FOR_COMMAND = 1 << 9;
    }
}

/// These are the possible return values for expand_string.
///
/// wildcard_no_match and wildcard_match are normal exit conditions used only on strings containing
/// wildcards to tell if the wildcard produced any matches.
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExpandResult {
    /// There was an error, for example, unmatched braces.
    error,
    /// Expansion succeeded.
    ok,
    /// Expansion succeeded, and a wildcard in the string matched at least one file.
    wildcard_match,
    /// Expansion succeeded, but a wildcard in the string matched no files, so the output is
    /// empty.
    wildcard_no_match,
}

/// The string represented by PROCESS_EXPAND_SELF.
pub const PROCESS_EXPAND_SELF_STR: &wstr = L!("%self");

/// Characters which make a string unclean if they are the first character of the string. See
/// [`expand_is_clean()`].
const UNCLEAN_FIRST: &wstr = L!("~%");
/// Unclean characters. See [`expand_is_clean()`].
const UNCLEAN: &wstr = L!("$*?\\\"'({})");

/// Test if the specified argument is clean, i.e. it does not contain any tokens which need to be
/// expanded or otherwise altered. Clean strings can be passed through expand_string and expand_one
/// without changing them. About two thirds of all strings are clean, so skipping expansion on them
/// actually does save a small amount of time, since it avoids multiple memory allocations during
/// the expansion process.
fn expand_is_clean(input: &wstr) -> bool {
    if input.is_empty() {
        return true;
    }

    // Test characters that have a special meaning in the first character position.
    if UNCLEAN_FIRST.contains(input.as_char_slice()[0]) {
        return false;
    }

    // Test characters that have a special meaning in any character position.
    !input.chars().any(|c| UNCLEAN.contains(c))
}

/// Append a syntax error to the given error list.
macro_rules! append_syntax_error {
    ($errors:expr, $source_start:expr, $text:expr $(,)?) => {
        if let Some(ref mut errors) = $errors {
            let mut error = ParseError::default();
            error.source_start = $source_start;
            error.source_length = 0;
            error.code = ParseErrorCode::syntax;
            error.text = $text;
            errors.push(error);
        }
    };
}

/// Append a cmdsub error to the given error list. But only do so if the error hasn't already been
/// recorded. This is needed because command substitution is a recursive process and some errors
/// could consequently be recorded more than once.
macro_rules! append_cmdsub_error {
    ($errors:expr, $source_start:expr, $source_end:expr, $text:expr $(,)?) => {
        if let Some(ref mut errors) = $errors {
            let mut error = ParseError::default();
            error.source_start = $source_start;
            error.source_length = $source_end - $source_start + 1;
            error.code = ParseErrorCode::cmdsubst;
            error.text = $text;
            if !errors.iter().any(|e| e.text == error.text) {
                errors.push(error);
            }
        }
    };
}

/// Append an overflow error, when expansion produces too many results.
fn append_overflow_error(
    errors: &mut Option<&mut ParseErrorList>,
    source_start: Option<usize>,
) -> ExpandResult {
    if let Some(ref mut errors) = errors {
        let mut error = ParseError::default();
        error.source_start = source_start.unwrap_or(SOURCE_LOCATION_UNKNOWN);
        error.source_length = 0;
        error.code = ParseErrorCode::generic;
        error.text = L!("Expansion produced too many results").to_owned();
        errors.push(error);
    }
    ExpandResult::error
}

/// Perform various forms of expansion on in, such as tilde expansion (`~USER` becomes the user's
/// home directory), variable expansion (`$VAR_NAME` becomes the value of the variable VAR_NAME),
/// cmdsubst expansion and wildcard expansion. The results are inserted into the list out.
///
/// If the parameter does not need expansion, it is copied into the list out.
///
/// wildcard_no_match and wildcard_match are normal exit conditions used only on strings containing
/// wildcards to tell if the wildcard produced any matches.
pub fn expand_string(
    input: WString,
    out_completions: &mut CompletionList,
    flags: ExpandFlags,
    ctx: &OperationContext,
    errors: Option<&mut ParseErrorList>,
) -> ExpandResult {
    let mut completions = vec![];
    std::mem::swap(&mut completions, out_completions);
    let mut recv = CompletionReceiver::from_list(completions, ctx.expansion_limit);
    let result = expand_to_receiver(input, &mut recv, flags, ctx, errors);
    *out_completions = recv.take();
    result
}

/// Variant of [`expand_string()`] that inserts its results into a [`CompletionReceiver`].
pub fn expand_to_receiver(
    input: WString,
    out_completions: &mut CompletionReceiver,
    flags: ExpandFlags,
    ctx: &OperationContext,
    mut errors: Option<&mut ParseErrorList>,
) -> ExpandResult {
    expand_pipeline(input, out_completions, flags, ctx, &mut errors)
}

/// expand_one is identical to expand_string, except it will fail if in expands to more than one
/// string. This is used for expanding command names.
pub fn expand_one(
    s: &mut WString,
    flags: ExpandFlags,
    ctx: &OperationContext,
    errors: Option<&mut ParseErrorList>,
) -> bool {
    let mut completions = CompletionList::new();

    if !flags.contains(ExpandFlags::FOR_COMPLETIONS) && expand_is_clean(s) {
        return true;
    }

    let mut tmp = WString::new();
    std::mem::swap(s, &mut tmp);
    if expand_string(
        tmp,
        &mut completions,
        flags | ExpandFlags::NO_DESCRIPTIONS,
        ctx,
        errors,
    ) == ExpandResult::ok
        && completions.len() == 1
    {
        std::mem::swap(s, &mut completions[0].completion);
        return true;
    }

    false
}

/// Expand a command string like `$HOME/bin/cmd` into a command and list of arguments. The command
/// and arguments are returned by reference.
///
/// If the expansion resulted in no or an empty command, the command will be an empty string. Note
/// that this API does not distinguish between expansion resulting in an empty command (''), and
/// expansion resulting in no command (e.g. unset variable).
///
/// If `skip_wildcards` is true, then do not do wildcard expansion.
pub fn expand_to_command_and_args(
    instr: &wstr,
    ctx: &OperationContext,
    out_cmd: &mut WString,
    mut out_args: Option<&mut Vec<WString>>,
    errors: Option<&mut ParseErrorList>,
    skip_wildcards: bool,
) -> ExpandResult {
    // Fast path.
    if expand_is_clean(instr) {
        *out_cmd = instr.to_owned();
        return ExpandResult::ok;
    }

    let mut eflags =
        ExpandFlags::SKIP_CMDSUBST | ExpandFlags::NO_DESCRIPTIONS | ExpandFlags::SKIP_JOBS;
    if skip_wildcards {
        eflags |= ExpandFlags::SKIP_WILDCARDS;
    }

    let mut completions = CompletionList::new();
    let expand_err = expand_string(instr.to_owned(), &mut completions, eflags, ctx, errors);
    if matches!(expand_err, ExpandResult::ok | ExpandResult::wildcard_match) {
        // The first completion is the command, any remaining are arguments.
        let mut completions = completions.into_iter();
        if let Some(comp) = completions.next() {
            *out_cmd = comp.completion;
        }
        if let Some(ref mut out_args) = out_args {
            for comp in completions {
                out_args.push(comp.completion);
            }
        }
    }

    expand_err
}

/// Convert the variable value to a human readable form, i.e. escape things, handle arrays, etc.
/// Suitable for pretty-printing.
pub fn expand_escape_variable(var: &EnvVar) -> WString {
    let mut buff = WString::new();

    let lst = var.as_list();
    for el in lst {
        if !buff.is_empty() {
            buff.push_str("  ");
        }

        // We want to use quotes if we have more than one string, or the string contains a space.
        let prefer_quotes = lst.len() > 1 || el.contains(' ');
        if prefer_quotes && is_quotable(el) {
            buff.push('\'');
            buff.push_utfstr(el);
            buff.push('\'');
        } else {
            buff.push_utfstr(&escape_string(el, EscapeFlags::default()));
        }
    }
    buff
}

/// Convert a string value to a human readable form, i.e. escape things, handle arrays, etc.
/// Suitable for pretty-printing.
pub fn expand_escape_string(el: &wstr) -> WString {
    let mut buff = WString::new();
    let prefer_quotes = el.contains(' ');
    if prefer_quotes && is_quotable(el) {
        buff.push('\'');
        buff.push_utfstr(el);
        buff.push('\'');
    } else {
        buff.push_utfstr(&escape_string(el, EscapeFlags::default()));
    }
    buff
}

/// Test if the specified string does not contain character which can not be used inside a quoted
/// string.
fn is_quotable(s: &wstr) -> bool {
    !s.chars().any(|c| "\n\t\r\x08\x1B".contains(c))
}

enum ParseSliceError {
    zero_index,
    invalid_index,
}

/// Parse an array slicing specification. The parsed indices are appended to `idx`. On success,
/// return the offset just past the closing `]`. On error, return the offset of the bad token and
/// what was wrong with it. Note that 0 can never be a bad offset because the string always starts
/// with `[`.
fn parse_slice(
    input: &wstr,
    idx: &mut Vec<i64>,
    array_size: usize,
) -> Result<usize, (usize, ParseSliceError)> {
    let size = i64::try_from(array_size).unwrap();
    let mut pos = 1; // skip past the opening square bracket

    loop {
        while input.char_at(pos).is_whitespace() || input.char_at(pos) == INTERNAL_SEPARATOR {
            pos += 1;
        }
        if input.char_at(pos) == ']' {
            pos += 1;
            break;
        }

        let tmp = if idx.is_empty() && input.char_at(pos) == '.' && input.char_at(pos + 1) == '.' {
            // If we are at the first index expression, a missing start-index means the range
            // starts at the first item.
            1 // first index
        } else {
            let mut consumed = 0;
            match wcstoi_partial(&input[pos..], Options::default(), &mut consumed) {
                Ok(tmp) => {
                    if tmp == 0 {
                        // Explicitly refuse $foo[0] as valid syntax, regardless of whether or not
                        // we're going to show an error if the index ultimately evaluates to zero.
                        // This will help newcomers avoid a common off-by-one error.
                        return Err((pos, ParseSliceError::zero_index));
                    }
                    pos += consumed;
                    // Skip trailing whitespace.
                    pos += input[pos..]
                        .chars()
                        .take_while(|c| c.is_whitespace())
                        .count();
                    tmp
                }
                Err(_error) => {
                    return Err((pos, ParseSliceError::invalid_index));
                }
            }
        };

        let mut i1 = if tmp > -1 { tmp } else { size + tmp + 1 };
        while input.char_at(pos) == INTERNAL_SEPARATOR {
            pos += 1;
        }
        if input.char_at(pos) == '.' && input.char_at(pos + 1) == '.' {
            pos += 2;
            while input.char_at(pos) == INTERNAL_SEPARATOR {
                pos += 1;
            }
            while input.char_at(pos).is_whitespace() {
                pos += 1; // Allow the space in "[.. ]".
            }

            // If we are at the last index range expression then a missing end-index means the
            // range spans until the last item.
            let tmp1 = if input.char_at(pos) == ']' {
                -1 // last index
            } else {
                let mut consumed = 0;
                match wcstoi_partial(&input[pos..], Options::default(), &mut consumed) {
                    Ok(tmp) => {
                        if tmp == 0 {
                            return Err((pos, ParseSliceError::zero_index));
                        }
                        pos += consumed;
                        // Skip trailing whitespace.
                        pos += input[pos..]
                            .chars()
                            .take_while(|c| c.is_whitespace())
                            .count();
                        tmp
                    }
                    Err(_error) => {
                        return Err((pos, ParseSliceError::invalid_index));
                    }
                }
            };

            let mut i2 = if tmp1 > -1 { tmp1 } else { size + tmp1 + 1 };
            // Skip sequences that are entirely outside.
            // This means "17..18" expands to nothing if there are less than 17 elements.
            if i1 > size && i2 > size {
                continue;
            }
            let mut direction = if i2 < i1 { -1 } else { 1 };
            // If only the beginning is negative, always go reverse.
            // If only the end, always go forward.
            // Prevents `[x..-1]` from going reverse if less than x elements are there.
            if (tmp1 > -1) != (tmp > -1) {
                direction = if tmp1 > -1 { -1 } else { 1 };
            } else {
                // Clamp to array size when not forcing direction
                // - otherwise "2..-1" clamps both to 1 and then becomes "1..1".
                i1 = i1.min(size);
                i2 = i2.min(size);
            }
            let mut jjj = i1;
            while jjj * direction <= i2 * direction {
                idx.push(jjj);
                jjj += direction;
            }
            continue;
        }

        idx.push(i1);
    }

    Ok(pos)
}

/// Expand all variables in the string `instr`.
///
/// There are lots of little corner cases: $$foo should do a double expansion, $foo$bar should not
/// double expand bar, an empty quoted expansion inside a compound still has to trigger
/// re-expansion, etc.
///
/// This function operates on strings backwards, starting at last_idx.
///
/// Note: last_idx is considered to be where it previously finished processing. This means it
/// actually starts operating on last_idx-1. As such, to process a string fully, pass
/// string.len() as last_idx instead of string.len()-1.
fn expand_variables(
    instr: WString,
    out: &mut CompletionReceiver,
    last_idx: usize,
    ctx: &OperationContext,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    // last_idx may be 1 past the end of the string, but no further.
    assert!(last_idx <= instr.len(), "Invalid last_idx");
    if last_idx == 0 {
        if !out.add(instr) {
            return append_overflow_error(errors, None);
        }
        return ExpandResult::ok;
    }

    // Locate the last VARIABLE_EXPAND or VARIABLE_EXPAND_SINGLE.
    let mut is_single = false;
    let mut varexp_char_idx = last_idx;
    loop {
        let done = varexp_char_idx == 0;
        varexp_char_idx = varexp_char_idx.wrapping_sub(1);
        if done {
            break;
        }
        let c = instr.as_char_slice()[varexp_char_idx];
        if [VARIABLE_EXPAND, VARIABLE_EXPAND_SINGLE].contains(&c) {
            is_single = c == VARIABLE_EXPAND_SINGLE;
            break;
        }
    }
    if varexp_char_idx == usize::MAX {
        // No variable expand char, we're done.
        if !out.add(instr) {
            return append_overflow_error(errors, None);
        }
        return ExpandResult::ok;
    }

    // Get the variable name.
    let var_name_start = varexp_char_idx + 1;
    let mut var_name_stop = var_name_start;
    while var_name_stop < instr.len() {
        let nc = instr.as_char_slice()[var_name_stop];
        if nc == VARIABLE_EXPAND_EMPTY {
            var_name_stop += 1;
            break;
        }
        if !valid_var_name_char(nc) {
            break;
        }
        var_name_stop += 1;
    }
    assert!(
        var_name_stop >= var_name_start,
        "Bogus variable name indexes"
    );

    // Get the variable name as a string, then try to get the variable from env.
    let var_name = &instr[var_name_start..var_name_stop];

    // It's an error if the name is empty.
    if var_name.is_empty() {
        if let Some(ref mut errors) = errors {
            parse_util_expand_variable_error(
                &instr,
                0, /* global_token_pos */
                varexp_char_idx,
                errors,
            );
        }
        return ExpandResult::error;
    }

    // We expand from either a variable or the history collaborator. "history" cannot be shadowed
    // in the variable store, so it is safe to special-case it by name; a context without a
    // history collaborator treats it as unset.
    let mut history = None;
    let mut var = None;
    if var_name == "history" {
        history = ctx.history();
    } else if var_name.as_char_slice() != [VARIABLE_EXPAND_EMPTY] {
        var = ctx.vars().get(var_name);
    }

    // Parse out any following slice.
    // Record the end of the variable name and any following slice.
    let mut var_name_and_slice_stop = var_name_stop;
    let mut all_values = true;
    let slice_start = var_name_stop;
    let mut var_idx_list = vec![];

    if instr.as_char_slice().get(slice_start) == Some(&'[') {
        all_values = false;
        // If a variable is missing, behave as though we have one value, so that $var[1] always
        // works.
        let mut effective_val_count = 1;
        if let Some(ref var) = var {
            effective_val_count = var.as_list().len();
        } else if let Some(history) = history {
            effective_val_count = history.size();
        }
        match parse_slice(
            &instr[slice_start..],
            &mut var_idx_list,
            effective_val_count,
        ) {
            Ok(offset) => {
                var_name_and_slice_stop = slice_start + offset;
            }
            Err((bad_pos, error)) => {
                match error {
                    ParseSliceError::zero_index => {
                        append_syntax_error!(
                            errors,
                            slice_start + bad_pos,
                            L!("array indices start at 1, not 0.").to_owned(),
                        );
                    }
                    ParseSliceError::invalid_index => {
                        append_syntax_error!(
                            errors,
                            slice_start + bad_pos,
                            L!("Invalid index value").to_owned(),
                        );
                    }
                }
                return ExpandResult::error;
            }
        }
    }
    let var_idx_list: Vec<usize> = var_idx_list
        .iter()
        .filter_map(|&n| usize::try_from(n).ok())
        .collect();

    if var.is_none() && history.is_none() {
        // Expanding a non-existent variable.
        if !is_single {
            // Normal expansions of missing variables successfully expand to nothing.
            return ExpandResult::ok;
        }
        // Expansion to single argument.
        // Replace the variable name and slice with VARIABLE_EXPAND_EMPTY.
        let mut res = instr[..varexp_char_idx].to_owned();
        if res.as_char_slice().last() == Some(&VARIABLE_EXPAND_SINGLE) {
            res.push(VARIABLE_EXPAND_EMPTY);
        }
        res.push_utfstr(&instr[var_name_and_slice_stop..]);
        return expand_variables(res, out, varexp_char_idx, ctx, errors);
    }

    // Ok, we have a variable or a history. Let's expand it.
    // Start by respecting the sliced elements.
    let mut var_item_list = vec![];
    if all_values {
        var_item_list = if let Some(history) = history {
            history.get_history()
        } else {
            var.as_ref().unwrap().as_list().to_vec()
        };
    } else {
        // We have to respect the slice.
        if let Some(history) = history {
            // Ask history to map indexes to item strings.
            // Note this may have missing entries for out-of-bounds.
            let item_map = history.items_at_indexes(&var_idx_list);
            for item_index in &var_idx_list {
                if let Some(item) = item_map.get(item_index) {
                    var_item_list.push(item.clone());
                }
            }
        } else {
            let all_var_items = var.as_ref().unwrap().as_list();
            for item_index in &var_idx_list {
                // Check that we are within array bounds. If not, skip the element. Note: negative
                // indices (`echo $foo[-1]`) are already converted to positive ones here, so an
                // index below 1 is definitely not in.
                // Note we are 1-based.
                if *item_index >= 1 && *item_index <= all_var_items.len() {
                    var_item_list.push(all_var_items[item_index - 1].to_owned());
                }
            }
        }
    }

    if is_single {
        // Quoted expansion. Here we expect the variable's delimiter.
        // Note history always has a space delimiter.
        let delimit = if history.is_some() {
            ' '
        } else {
            var.as_ref().unwrap().get_delimiter()
        };
        let mut res = instr[..varexp_char_idx].to_owned();
        if !res.is_empty() {
            if res.as_char_slice().last() != Some(&VARIABLE_EXPAND_SINGLE) {
                res.push(INTERNAL_SEPARATOR);
            } else if var_item_list.is_empty() || var_item_list[0].is_empty() {
                // First expansion is empty, but we need to recursively expand.
                res.push(VARIABLE_EXPAND_EMPTY);
            }
        }

        // Append all entries in var_item_list, separated by the delimiter.
        res.push_utfstr(&join_strings(&var_item_list, delimit));
        res.push_utfstr(&instr[var_name_and_slice_stop..]);
        expand_variables(res, out, varexp_char_idx, ctx, errors)
    } else {
        // Normal cartesian-product expansion.
        for item in var_item_list {
            if varexp_char_idx == 0 && var_name_and_slice_stop == instr.len() {
                if !out.add(item) {
                    return append_overflow_error(errors, None);
                }
            } else {
                let mut new_in = instr[..varexp_char_idx].to_owned();
                if !new_in.is_empty() {
                    if new_in.as_char_slice().last() != Some(&VARIABLE_EXPAND) {
                        new_in.push(INTERNAL_SEPARATOR);
                    } else if item.is_empty() {
                        new_in.push(VARIABLE_EXPAND_EMPTY);
                    }
                }
                new_in.push_utfstr(&item);
                new_in.push_utfstr(&instr[var_name_and_slice_stop..]);
                let res = expand_variables(new_in, out, varexp_char_idx, ctx, errors);
                if res != ExpandResult::ok {
                    return res;
                }
            }
        }
        ExpandResult::ok
    }
}

/// Perform brace expansion, placing the expanded strings into `out`.
fn expand_braces(
    input: WString,
    flags: ExpandFlags,
    out: &mut CompletionReceiver,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    let mut syntax_error = false;
    let mut brace_count = 0;

    let mut brace_begin = None;
    let mut brace_end = None;
    let mut last_sep = None;

    // Locate the first non-nested brace pair.
    for (pos, c) in input.chars().enumerate() {
        match c {
            BRACE_BEGIN => {
                if brace_count == 0 {
                    brace_begin = Some(pos);
                }
                brace_count += 1;
            }
            BRACE_END => {
                brace_count -= 1;
                #[allow(clippy::comparison_chain)]
                if brace_count < 0 {
                    syntax_error = true;
                } else if brace_count == 0 {
                    brace_end = Some(pos);
                }
            }
            BRACE_SEP => {
                if brace_count == 1 {
                    last_sep = Some(pos);
                }
            }
            _ => {
                // we ignore all other characters here
            }
        }
    }

    if brace_count > 0 {
        if !flags.contains(ExpandFlags::FOR_COMPLETIONS) {
            syntax_error = true;
        } else {
            // The user hasn't typed an end brace yet; make one up and append it, then expand
            // that. Keep only the last item, since it is the one being typed.
            let mut synth = WString::new();
            if let Some(last_sep) = last_sep {
                synth.push_utfstr(&input[..brace_begin.unwrap() + 1]);
                synth.push_utfstr(&input[last_sep + 1..]);
                synth.push(BRACE_END);
            } else {
                synth.push_utfstr(&input);
                synth.push(BRACE_END);
            }

            return expand_braces(synth, flags, out, errors);
        }
    }

    if syntax_error {
        append_syntax_error!(
            errors,
            SOURCE_LOCATION_UNKNOWN,
            L!("Mismatched braces").to_owned(),
        );
        return ExpandResult::error;
    }

    let Some(brace_begin) = brace_begin else {
        // No more brace expansions left; we can return the value as-is.
        if !out.add(input) {
            return append_overflow_error(errors, None);
        }
        return ExpandResult::ok;
    };
    let brace_end = brace_end.unwrap();

    let length_preceding_braces = brace_begin;
    let length_following_braces = input.len() - brace_end - 1;
    let tot_len = length_preceding_braces + length_following_braces;
    let mut item_begin = brace_begin + 1;
    for (pos, c) in input.chars().enumerate().skip(brace_begin + 1) {
        if brace_count == 0 && (c == BRACE_SEP || pos == brace_end) {
            assert!(pos >= item_begin);
            let item_len = pos - item_begin;
            let item = input[item_begin..pos].to_owned();
            let mut item = trim(item, Some(wstr::from_char_slice(&[BRACE_SPACE])));
            for c in item.as_char_slice_mut() {
                if *c == BRACE_SPACE {
                    *c = ' ';
                }
            }

            // Each item is a whitespace- and brace-stripped member of a single pass of brace
            // expansion, e.g. in `{ alpha , b,{c, d }}`, the members of the first pass are
            // `alpha`, `b`, and `c, d` (with nested commas in marker form). Recurse on
            // prefix + item + suffix until everything is fully expanded.
            let mut whole_item = WString::new();
            whole_item.reserve(tot_len + item_len + 2);
            whole_item.push_utfstr(&input[..length_preceding_braces]);
            whole_item.push_utfstr(&item);
            whole_item.push_utfstr(&input[brace_end + 1..]);
            let res = expand_braces(whole_item, flags, out, errors);
            if res != ExpandResult::ok {
                return res;
            }

            item_begin = pos + 1;
            if pos == brace_end {
                break;
            }
        }

        if c == BRACE_BEGIN {
            brace_count += 1;
        }

        if c == BRACE_END {
            brace_count -= 1;
        }
    }

    ExpandResult::ok
}

/// Expand a command substitution `input`, executing on `ctx`, and inserting the results into
/// `out`, or any errors into `errors`.
pub fn expand_cmdsubst(
    input: WString,
    ctx: &OperationContext,
    out: &mut CompletionReceiver,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    let mut cursor = 0;
    let parens = match parse_util_locate_cmdsubst_range(&input, &mut cursor, false) {
        MaybeParentheses::Error => {
            append_syntax_error!(
                errors,
                SOURCE_LOCATION_UNKNOWN,
                L!("Mismatched parenthesis").to_owned(),
            );
            return ExpandResult::error;
        }
        MaybeParentheses::None => {
            if !out.add(input) {
                return append_overflow_error(errors, None);
            }
            return ExpandResult::ok;
        }
        MaybeParentheses::CommandSubstitution(parens) => parens,
    };

    let subshell = ctx
        .subshell()
        .expect("Must have a subshell executor to expand command substitutions");

    let mut sub_res = vec![];
    if let Err(subshell_status) = subshell.exec_subshell(&input[parens.command()], &mut sub_res) {
        let err = match subshell_status {
            STATUS_READ_TOO_MUCH => {
                L!("Too much data emitted by command substitution so it was discarded")
            }
            STATUS_CMD_UNKNOWN => L!("Unknown command"),
            STATUS_ILLEGAL_CMD => L!("Commandname was invalid"),
            STATUS_NOT_EXECUTABLE => L!("Command not executable"),
            STATUS_INVALID_ARGS => L!("Invalid arguments"),
            STATUS_EXPAND_ERROR => L!("Expansion error"),
            STATUS_UNMATCHED_WILDCARD => L!("Unmatched wildcard"),
            _ => L!("Unknown error while evaluating command substitution"),
        };
        append_cmdsub_error!(errors, parens.start(), parens.end() - 1, err.to_owned());
        return ExpandResult::error;
    }

    // Expand slices like (cat /var/words)[1]
    let mut tail_begin = parens.end();
    if input.as_char_slice().get(tail_begin) == Some(&'[') {
        let mut slice_idx = vec![];
        let slice_begin = tail_begin;
        let slice_end = match parse_slice(&input[slice_begin..], &mut slice_idx, sub_res.len()) {
            Ok(offset) => slice_begin + offset,
            Err((bad_pos, error)) => {
                match error {
                    ParseSliceError::zero_index => {
                        append_syntax_error!(
                            errors,
                            slice_begin + bad_pos,
                            L!("array indices start at 1, not 0.").to_owned(),
                        );
                    }
                    ParseSliceError::invalid_index => {
                        append_syntax_error!(
                            errors,
                            slice_begin + bad_pos,
                            L!("Invalid index value").to_owned(),
                        );
                    }
                }
                return ExpandResult::error;
            }
        };

        let mut sub_res2 = vec![];
        tail_begin = slice_end;
        for idx in slice_idx {
            if idx < 1 || idx as usize > sub_res.len() {
                // Out-of-bounds indices are silently dropped.
                continue;
            }
            // -1 to convert from 1-based slice index to 0-based vector index.
            sub_res2.push(sub_res[idx as usize - 1].to_owned());
        }
        sub_res = sub_res2;
    }

    // Recursively call ourselves to expand any remaining command substitutions. The result of
    // this recursive call using the tail of the string is inserted into the tail_expand list.
    let mut tail_expand_recv = out.subreceiver();
    let tail = input[tail_begin..].to_owned();
    let tail_res = expand_cmdsubst(tail, ctx, &mut tail_expand_recv, errors);
    if tail_res != ExpandResult::ok {
        return tail_res;
    }
    let tail_expand = tail_expand_recv.take();

    // Combine the result of the current command substitution with the result of the recursive
    // tail expansion. The command output is escaped so that it round-trips through the
    // subsequent unescape, including inside brace groups.
    for sub_item in sub_res {
        let sub_item2 = escape_string(&sub_item, EscapeFlags::COMMA);
        for tail_item in &tail_expand {
            let mut whole_item = WString::new();
            whole_item
                .reserve(parens.start() + 1 + sub_item2.len() + 1 + tail_item.completion.len());
            whole_item.push_utfstr(&input[..parens.start()]);
            whole_item.push(INTERNAL_SEPARATOR);
            whole_item.push_utfstr(&sub_item2);
            whole_item.push(INTERNAL_SEPARATOR);
            whole_item.push_utfstr(&tail_item.completion);
            if !out.add(whole_item) {
                return append_overflow_error(errors, None);
            }
        }
    }

    ExpandResult::ok
}

// Given that input[0] is HOME_DIRECTORY or tilde (ugh), return the user's name. Return the empty
// string if it is just a tilde. Also return by reference the index of the first character of the
// remaining part of the string (e.g. the subsequent slash).
fn get_home_directory_name<'a>(input: &'a wstr, out_tail_idx: &mut usize) -> &'a wstr {
    assert!([HOME_DIRECTORY, '~'].contains(&input.as_char_slice()[0]));
    // We get the position of the /, but we need to remove it as well.
    if let Some(pos) = input.chars().position(|c| c == '/') {
        *out_tail_idx = pos;
        &input[1..pos]
    } else {
        *out_tail_idx = input.len();
        &input[1..]
    }
}

/// Attempts tilde expansion of the string specified, modifying it in place.
fn expand_home_directory(
    input: &mut WString,
    vars: &dyn Environment,
    users: Option<&dyn UserDirs>,
) {
    let starts_with_home = input.as_char_slice().first() == Some(&HOME_DIRECTORY);
    // The marker is only ever produced in first position; every marker becomes a literal tilde
    // again so that none can leak out of the pipeline.
    for c in input.as_char_slice_mut() {
        if *c == HOME_DIRECTORY {
            *c = '~';
        }
    }
    if !starts_with_home {
        return;
    }

    let mut tail_idx = usize::MAX;
    let username = get_home_directory_name(input, &mut tail_idx);
    let mut home = None;
    if username.is_empty() {
        // Current user's home directory.
        match vars.get_unless_empty(L!("HOME")) {
            None => {
                input.clear();
                return;
            }
            Some(home_var) => {
                home = Some(home_var.as_string());
                tail_idx = 1;
            }
        };
    } else {
        // Some other user's home directory.
        if let Some(users) = users {
            home = users.home_for_user(username);
        }
    }

    if let Some(home) = home {
        let home = crate::path::normalize_path(&home, true);
        input.replace_range(..tail_idx, &home);
    }
    // On failure the literal tilde remains.
}

/// Expand the %self escape. Note this can only come at the beginning of the string.
fn expand_percent_self(input: &mut WString) {
    if input.as_char_slice().first() == Some(&PROCESS_EXPAND_SELF) {
        input.replace_range(0..1, &getpid().to_wstring());
    }
}

/// Perform tilde expansion and nothing else on the specified string, which is modified in place.
pub fn expand_tilde(input: &mut WString, vars: &dyn Environment, users: Option<&dyn UserDirs>) {
    if input.chars().next() == Some('~') {
        input.replace_range(0..1, wstr::from_char_slice(&[HOME_DIRECTORY]));
        expand_home_directory(input, vars, users);
    }
}

/// Remove any internal separators. Also optionally convert wildcard characters to regular
/// equivalents. This is done to support skip_wildcards.
fn remove_internal_separator(s: &mut WString, conv: bool) {
    // Remove all instances of INTERNAL_SEPARATOR.
    s.retain(|c| c != INTERNAL_SEPARATOR);

    // If conv is true, replace all instances of ANY_CHAR with '?', and ANY_STRING and
    // ANY_STRING_RECURSIVE with '*'.
    if conv {
        for c in s.as_char_slice_mut() {
            match *c {
                ANY_CHAR => {
                    *c = '?';
                }
                ANY_STRING | ANY_STRING_RECURSIVE => {
                    *c = '*';
                }
                _ => {
                    // we ignore all other characters
                }
            }
        }
    }
}

/// An expansion stage: a pure function accepting the input string (transferring ownership) and
/// returning the list of output completions by reference. It may return an error, which halts
/// expansion.
type ExpandStage = fn(
    &OperationContext,
    ExpandFlags,
    WString,
    &mut CompletionReceiver,
    &mut Option<&mut ParseErrorList>,
) -> ExpandResult;

/// Our expansion stages, in the order they run.
const STAGES: [ExpandStage; 5] = [
    stage_cmdsubst,
    stage_variables,
    stage_braces,
    stage_home_and_self,
    stage_wildcards,
];

fn stage_cmdsubst(
    ctx: &OperationContext,
    flags: ExpandFlags,
    input: WString,
    out: &mut CompletionReceiver,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    if flags.contains(ExpandFlags::SKIP_CMDSUBST) {
        let mut cursor = 0;
        match parse_util_locate_cmdsubst_range(&input, &mut cursor, true) {
            MaybeParentheses::Error => ExpandResult::error,
            MaybeParentheses::None => {
                if !out.add(input) {
                    return append_overflow_error(errors, None);
                }
                ExpandResult::ok
            }
            MaybeParentheses::CommandSubstitution(parens) => {
                append_cmdsub_error!(
                    errors,
                    parens.start(),
                    parens.end() - 1,
                    L!("Command substitutions not allowed").to_owned(),
                );
                ExpandResult::error
            }
        }
    } else {
        assert!(
            ctx.has_subshell(),
            "Must have a subshell executor to expand command substitutions"
        );
        expand_cmdsubst(input, ctx, out, errors)
    }
}

fn stage_variables(
    ctx: &OperationContext,
    flags: ExpandFlags,
    input: WString,
    out: &mut CompletionReceiver,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    // We accept incomplete strings here, since completion uses expand_string to expand incomplete
    // strings from the commandline.
    let mut next = unescape_string(&input, UnescapeFlags::SPECIAL | UnescapeFlags::INCOMPLETE)
        .unwrap_or_default();

    if flags.contains(ExpandFlags::SKIP_VARIABLES) {
        for c in next.as_char_slice_mut() {
            if [VARIABLE_EXPAND, VARIABLE_EXPAND_SINGLE].contains(c) {
                *c = '$';
            }
        }
        if !out.add(next) {
            return append_overflow_error(errors, None);
        }
        ExpandResult::ok
    } else {
        let size = next.len();
        expand_variables(next, out, size, ctx, errors)
    }
}

fn stage_braces(
    _ctx: &OperationContext,
    flags: ExpandFlags,
    input: WString,
    out: &mut CompletionReceiver,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    expand_braces(input, flags, out, errors)
}

fn stage_home_and_self(
    ctx: &OperationContext,
    flags: ExpandFlags,
    mut input: WString,
    out: &mut CompletionReceiver,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    if !flags.contains(ExpandFlags::SKIP_HOME_DIRECTORIES) {
        expand_home_directory(&mut input, ctx.vars(), ctx.user_dirs());
    } else {
        // Not expanding, but the marker must not leak; it becomes a literal tilde again.
        for c in input.as_char_slice_mut() {
            if *c == HOME_DIRECTORY {
                *c = '~';
            }
        }
    }
    expand_percent_self(&mut input);
    if !out.add(input) {
        return append_overflow_error(errors, None);
    }
    ExpandResult::ok
}

fn stage_wildcards(
    ctx: &OperationContext,
    flags: ExpandFlags,
    mut path_to_expand: WString,
    out: &mut CompletionReceiver,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    let mut result = ExpandResult::ok;

    remove_internal_separator(
        &mut path_to_expand,
        flags.contains(ExpandFlags::SKIP_WILDCARDS),
    );
    let has_wildcard = wildcard_has_internal(&path_to_expand); // e.g. ANY_STRING
    let for_completions = flags.contains(ExpandFlags::FOR_COMPLETIONS);
    let skip_wildcards = flags.contains(ExpandFlags::SKIP_WILDCARDS);

    if has_wildcard && flags.contains(ExpandFlags::EXECUTABLES_ONLY) {
        // Don't do wildcard expansion when searching for executables; historically such an
        // argument matches nothing.
    } else if (for_completions && !skip_wildcards) || has_wildcard {
        // We either have a wildcard, or we don't have a wildcard but we're doing completion
        // expansion (so we want to get the completion of a file path). Note that if
        // skip_wildcards is set, we stomped wildcards in remove_internal_separator above, so
        // there actually aren't any.
        //
        // So we're going to treat this input as a file path. Compute the "working directories",
        // which may be CDPATH if the special flag is set.
        let working_dir = ctx.vars().get_pwd_slash();
        let mut effective_working_dirs = vec![];
        let for_cd = flags.contains(ExpandFlags::SPECIAL_FOR_CD);
        let for_command = flags.contains(ExpandFlags::SPECIAL_FOR_COMMAND);
        if !for_cd && !for_command {
            // Common case.
            effective_working_dirs.push(working_dir);
        } else {
            // Either special_for_command or special_for_cd. We can handle these mostly the same.
            // There's the following differences:
            //
            // 1. An empty CDPATH should be treated as '.', but an empty PATH should be left empty
            // (no commands can be found). The wildcard matcher interprets an empty working
            // directory as "absolute paths only, no cwd prefix".
            //
            // 2. PATH is only "one level," while CDPATH is multiple levels. That is, input like
            // 'foo/bar' should resolve against CDPATH, but not PATH.
            //
            // In either case, we ignore the path if we start with ./ or /. Also ignore it if we
            // are doing command completion and we contain a slash, per IEEE 1003.1, chapter 8
            // under PATH.
            if path_to_expand.starts_with(L!("/"))
                || path_to_expand.starts_with(L!("./"))
                || path_to_expand.starts_with(L!("../"))
                || (for_command && path_to_expand.contains('/'))
            {
                effective_working_dirs.push(working_dir);
            } else {
                let mut paths = ctx
                    .vars()
                    .get(if for_cd { L!("CDPATH") } else { L!("PATH") })
                    .map(|var| var.as_list().to_owned())
                    .unwrap_or_default();
                if paths.is_empty() {
                    paths.push(if for_cd { L!(".") } else { L!("") }.to_owned());
                }
                for next_path in paths {
                    effective_working_dirs
                        .push(path_apply_working_directory(&next_path, &working_dir));
                }
            }
        }

        result = ExpandResult::wildcard_no_match;
        let mut expanded_recv = out.subreceiver();
        if let Some(matcher) = ctx.wildcards() {
            for effective_working_dir in effective_working_dirs {
                let expand_res = matcher.expand(
                    &path_to_expand,
                    &effective_working_dir,
                    flags,
                    &mut expanded_recv,
                );
                match expand_res {
                    WildcardResult::Match => result = ExpandResult::wildcard_match,
                    WildcardResult::NoMatch => (),
                    WildcardResult::Overflow => return append_overflow_error(errors, None),
                    WildcardResult::Cancel => return ExpandResult::error,
                }
            }
        }

        let mut expanded = expanded_recv.take();
        expanded.sort_by(|a, b| wcsfilecmp_glob(&a.completion, &b.completion));
        if !out.extend(expanded) {
            return append_overflow_error(errors, None);
        }
    } else {
        // SKIP_WILDCARDS is used when completing to mean don't do file expansions, so if we're
        // not doing file expansions, just drop this completion on the floor.
        #[allow(clippy::collapsible_if)]
        if !for_completions {
            if !out.add(path_to_expand) {
                return append_overflow_error(errors, None);
            }
        }
    }
    result
}

// Given an original input string, if it starts with a tilde, "unexpand" the expanded home
// directory back to the tilde in every completion which replaces its token. Note the prefix may
// be just a tilde or a user name like ~foo/.
fn unexpand_tildes(
    input: &wstr,
    vars: &dyn Environment,
    users: Option<&dyn UserDirs>,
    completions: &mut CompletionList,
) {
    // If input begins with tilde, then try to replace the corresponding string in each completion
    // with the tilde. If it does not, there's nothing to do.
    if input.as_char_slice().first() != Some(&'~') {
        return;
    }

    // We only operate on completions that replace their token. If we don't have any, we're done.
    // In particular, empty lists are common.
    if !completions.iter().any(|c| c.replaces_token()) {
        return;
    }

    // Get the username_with_tilde (like ~bert) and expand it into a home directory.
    let mut tail_idx = usize::MAX;
    let username_with_tilde =
        WString::from_str("~") + get_home_directory_name(input, &mut tail_idx);
    let mut home = username_with_tilde.clone();
    expand_tilde(&mut home, vars, users);
    if home.is_empty() || home == username_with_tilde {
        // The home directory is unset or failed to resolve; there is no prefix to rewrite.
        return;
    }

    // Now for each completion that starts with home, replace it with the username_with_tilde.
    for comp in completions {
        if comp.replaces_token() && comp.completion.starts_with(&home) {
            comp.completion
                .replace_range(..home.len(), &username_with_tilde);

            // And mark that our tilde is literal, so it doesn't try to escape it.
            comp.flags |= CompleteFlags::DONT_ESCAPE_TILDES;
        }
    }
}

/// The driver: fold the five stages over the working list of completions.
fn expand_pipeline(
    input: WString,
    out_completions: &mut CompletionReceiver,
    flags: ExpandFlags,
    ctx: &OperationContext,
    errors: &mut Option<&mut ParseErrorList>,
) -> ExpandResult {
    assert!(
        flags.contains(ExpandFlags::SKIP_CMDSUBST) || ctx.has_subshell(),
        "Must have a subshell executor if not skipping command substitutions"
    );

    // Early out. If we're not completing, and there's no magic in the input, we're done.
    if !flags.contains(ExpandFlags::FOR_COMPLETIONS) && expand_is_clean(&input) {
        if !out_completions.add(input) {
            return append_overflow_error(errors, None);
        }
        return ExpandResult::ok;
    }

    // Load up our single initial completion.
    let mut completions = vec![Completion::from_completion(input.clone())];

    let mut total_result = ExpandResult::ok;
    let mut output_storage = out_completions.subreceiver();
    for stage in STAGES {
        for comp in completions {
            if ctx.check_cancel() {
                total_result = ExpandResult::error;
                break;
            }
            let this_result = stage(ctx, flags, comp.completion, &mut output_storage, errors);
            // A wildcard_no_match from one completion must not hide a wildcard_match from
            // another completion in the same stage.
            if !(this_result == ExpandResult::wildcard_no_match
                && total_result == ExpandResult::wildcard_match)
            {
                total_result = this_result;
            }
            if total_result == ExpandResult::error {
                break;
            }
        }

        // Output becomes our next stage's input.
        completions = output_storage.take();
        if total_result == ExpandResult::error {
            break;
        }
    }

    if total_result != ExpandResult::error {
        // Restore tilde prefixes in completions so the user's literal prefix is preserved.
        if !flags.contains(ExpandFlags::SKIP_HOME_DIRECTORIES) {
            unexpand_tildes(&input, ctx.vars(), ctx.user_dirs(), &mut completions);
        }
        if !out_completions.extend(completions) {
            return append_overflow_error(errors, None);
        }
    }

    total_result
}
