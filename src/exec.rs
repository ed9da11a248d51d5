//! The interface to the command-substitution executor.

use crate::wchar::{wstr, WString};
use libc::c_int;

// Status codes a subshell may fail with. These mirror the exit statuses the outer shell assigns
// to the corresponding failures.
pub const STATUS_CMD_ERROR: c_int = 1;
pub const STATUS_INVALID_ARGS: c_int = 2;
pub const STATUS_EXPAND_ERROR: c_int = 121;
pub const STATUS_READ_TOO_MUCH: c_int = 122;
pub const STATUS_ILLEGAL_CMD: c_int = 123;
pub const STATUS_UNMATCHED_WILDCARD: c_int = 124;
pub const STATUS_NOT_EXECUTABLE: c_int = 126;
pub const STATUS_CMD_UNKNOWN: c_int = 127;

/// Executes command substitutions on behalf of the expansion core.
///
/// The executor runs arbitrary shell source and may therefore re-enter expansion recursively.
/// It owns output capture, including any cap on the amount of captured data
/// ([`STATUS_READ_TOO_MUCH`]).
pub trait SubshellExecutor {
    /// Execute `cmd` as a subshell, appending one entry per output line to `out`.
    /// On failure, return the status code describing the failure.
    fn exec_subshell(&self, cmd: &wstr, out: &mut Vec<WString>) -> Result<(), c_int>;
}
