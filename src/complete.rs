//! Completion values passed between expansion stages and returned to callers.

use crate::wchar::prelude::*;
use bitflags::bitflags;

bitflags! {
    /// Flags determining how a completion is to be inserted or displayed.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct CompleteFlags: u8 {
        /// This is not the suffix of a token, but replaces it entirely.
        const REPLACES_TOKEN = 1 << 0;
        /// If you do escape, don't escape tildes.
        const DONT_ESCAPE_TILDES = 1 << 1;
    }
}

pub type CompletionList = Vec<Completion>;

/// An expanded argument candidate: the string itself, an optional description for the UI layer,
/// and flags describing how the string relates to the token it was expanded from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Completion {
    /// The completion string.
    pub completion: WString,
    /// The description for this completion.
    pub description: WString,
    /// Flags determining the completion behavior.
    pub flags: CompleteFlags,
}

impl From<WString> for Completion {
    fn from(completion: WString) -> Completion {
        Completion {
            completion,
            ..Default::default()
        }
    }
}

impl Completion {
    pub fn new(completion: WString, description: WString, flags: CompleteFlags) -> Self {
        Self {
            completion,
            description,
            flags,
        }
    }

    pub fn from_completion(completion: WString) -> Self {
        Self::from(completion)
    }

    /// Returns whether this replaces its token.
    pub fn replaces_token(&self) -> bool {
        self.flags.contains(CompleteFlags::REPLACES_TOKEN)
    }
}

/// A completion receiver accepts completions. It is essentially a wrapper around `Vec` with a
/// limit on the number of completions that may be added; exceeding the limit is reported to the
/// caller so that a runaway expansion can be aborted.
pub struct CompletionReceiver {
    /// Our list of completions.
    completions: Vec<Completion>,
    /// The maximum number of completions to add. If our list length exceeds this, then new
    /// completions are not added. Note 0 has no special significance here - use
    /// `usize::MAX` instead.
    limit: usize,
}

// We are only wrapping a `Vec<Completion>`, any non-mutable methods can be safely deferred to the
// Vec-impl.
impl std::ops::Deref for CompletionReceiver {
    type Target = [Completion];

    fn deref(&self) -> &Self::Target {
        self.completions.as_slice()
    }
}

impl std::ops::DerefMut for CompletionReceiver {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.completions.as_mut_slice()
    }
}

impl CompletionReceiver {
    /// Construct as empty, with a limit.
    pub fn new(limit: usize) -> Self {
        Self {
            completions: vec![],
            limit,
        }
    }

    /// Acquire an existing list, with a limit.
    pub fn from_list(completions: Vec<Completion>, limit: usize) -> Self {
        Self { completions, limit }
    }

    /// Add a completion.
    /// Return true on success, false if this would overflow the limit.
    #[must_use]
    pub fn add(&mut self, comp: impl Into<Completion>) -> bool {
        if self.completions.len() >= self.limit {
            return false;
        }
        self.completions.push(comp.into());
        true
    }

    /// Add a list of completions.
    /// Return true on success, false if this would overflow the limit.
    #[must_use]
    pub fn extend(&mut self, comps: Vec<Completion>) -> bool {
        if comps.len() > self.limit.saturating_sub(self.completions.len()) {
            return false;
        }
        self.completions.extend(comps);
        true
    }

    /// Return the list of completions, clearing this receiver.
    pub fn take(&mut self) -> Vec<Completion> {
        std::mem::take(&mut self.completions)
    }

    /// Return a new receiver whose limit is our remaining capacity.
    /// This is useful for e.g. recursive calls when you want to act on the result before adding it.
    pub fn subreceiver(&self) -> CompletionReceiver {
        CompletionReceiver::new(self.limit.saturating_sub(self.completions.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wchar::L;

    #[test]
    fn test_receiver_limit() {
        let mut recv = CompletionReceiver::new(2);
        assert!(recv.add(L!("a").to_owned()));
        assert!(recv.add(L!("b").to_owned()));
        assert!(!recv.add(L!("c").to_owned()));
        assert_eq!(recv.len(), 2);

        let sub = recv.subreceiver();
        assert!(!sub.iter().any(|_| true));
        assert_eq!(sub.limit, 0);
    }

    #[test]
    fn test_receiver_extend() {
        let mut recv = CompletionReceiver::new(3);
        assert!(recv.add(L!("a").to_owned()));
        assert!(recv.extend(vec![
            Completion::from_completion(L!("b").to_owned()),
            Completion::from_completion(L!("c").to_owned()),
        ]));
        assert!(!recv.extend(vec![Completion::from_completion(L!("d").to_owned())]));
        assert_eq!(recv.take().len(), 3);
    }
}
