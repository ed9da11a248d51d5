//! The property bag of collaborators threaded through an expansion.

use crate::env::Environment;
use crate::exec::SubshellExecutor;
use crate::history::History;
use crate::users::UserDirs;
use crate::wildcard::WildcardMatcher;

/// A function which may be used to poll for cancellation.
pub type CancelChecker = Box<dyn Fn() -> bool>;

/// A common helper which always returns false.
pub fn no_cancel() -> bool {
    false
}

// Default limits for expansion.
/// The default maximum number of items from expansion.
pub const EXPANSION_LIMIT_DEFAULT: usize = 512 * 1024;
/// A smaller limit for background operations like syntax highlighting.
pub const EXPANSION_LIMIT_BACKGROUND: usize = 512;

/// An OperationContext bundles the collaborators and limits for one expansion. The variable store
/// is always present; the executor, history, user database, and wildcard matcher are optional,
/// and their absence disables the corresponding behavior (no command substitutions, `$history`
/// expands as unset, `~user` stays literal, wildcards match nothing).
pub struct OperationContext<'a> {
    vars: &'a dyn Environment,
    subshell: Option<&'a dyn SubshellExecutor>,
    history: Option<&'a dyn History>,
    user_dirs: Option<&'a dyn UserDirs>,
    wildcards: Option<&'a dyn WildcardMatcher>,

    /// The limit in the number of expansions which should be produced.
    pub expansion_limit: usize,

    /// A function which may be used to poll for cancellation.
    pub cancel_checker: CancelChecker,
}

impl<'a> OperationContext<'a> {
    /// Construct a context for a background operation: variables only, no cancellation.
    pub fn background(vars: &'a dyn Environment, expansion_limit: usize) -> Self {
        OperationContext {
            vars,
            subshell: None,
            history: None,
            user_dirs: None,
            wildcards: None,
            expansion_limit,
            cancel_checker: Box::new(no_cancel),
        }
    }

    /// Construct a context for a foreground operation, which may run command substitutions.
    pub fn foreground(
        vars: &'a dyn Environment,
        subshell: &'a dyn SubshellExecutor,
        cancel_checker: CancelChecker,
        expansion_limit: usize,
    ) -> Self {
        OperationContext {
            vars,
            subshell: Some(subshell),
            history: None,
            user_dirs: None,
            wildcards: None,
            expansion_limit,
            cancel_checker,
        }
    }

    pub fn with_history(mut self, history: &'a dyn History) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_user_dirs(mut self, user_dirs: &'a dyn UserDirs) -> Self {
        self.user_dirs = Some(user_dirs);
        self
    }

    pub fn with_wildcards(mut self, wildcards: &'a dyn WildcardMatcher) -> Self {
        self.wildcards = Some(wildcards);
        self
    }

    pub fn vars(&self) -> &dyn Environment {
        self.vars
    }

    pub fn subshell(&self) -> Option<&dyn SubshellExecutor> {
        self.subshell
    }

    pub fn has_subshell(&self) -> bool {
        self.subshell.is_some()
    }

    pub fn history(&self) -> Option<&dyn History> {
        self.history
    }

    pub fn user_dirs(&self) -> Option<&dyn UserDirs> {
        self.user_dirs
    }

    pub fn wildcards(&self) -> Option<&dyn WildcardMatcher> {
        self.wildcards
    }

    /// Invoke the cancel checker. Return whether we should cancel.
    pub fn check_cancel(&self) -> bool {
        (self.cancel_checker)()
    }
}
