//! The read-only view of the history store used by `$history` expansion.

use crate::wchar::WString;
use std::collections::HashMap;

/// Read-only access to the command history. Item indexes are 1-based, with index 1 being the most
/// recent item.
///
/// Construction of a real history store typically has main-thread affinity; providers enforce
/// that contract by withholding the collaborator (see
/// [`OperationContext::with_history`](crate::operation_context::OperationContext::with_history)),
/// in which case `$history` expands like an unset variable.
pub trait History {
    /// Return the number of history items.
    fn size(&self) -> usize;

    /// Return all history items, most recent first.
    fn get_history(&self) -> Vec<WString>;

    /// Map the given 1-based indexes to their item strings. Out-of-bounds indexes are absent from
    /// the result.
    fn items_at_indexes(&self, indexes: &[usize]) -> HashMap<usize, WString>;
}
