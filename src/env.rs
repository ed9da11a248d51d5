//! The read-only view of the variable store that expansion consults.

use crate::wchar::prelude::*;
use crate::wcstringutil::join_strings;

/// Character for separating values in path-style variables.
pub const PATH_ARRAY_SEP: char = ':';
/// Character for separating values in non-path variables.
pub const NONPATH_ARRAY_SEP: char = ' ';

/// A snapshot of a shell variable: a list of values, and whether the variable is a "path
/// variable" whose values are joined with colons rather than spaces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvVar {
    values: Vec<WString>,
    pathvar: bool,
}

impl EnvVar {
    pub fn new(values: Vec<WString>) -> Self {
        Self {
            values,
            pathvar: false,
        }
    }

    pub fn new_pathvar(values: Vec<WString>) -> Self {
        Self {
            values,
            pathvar: true,
        }
    }

    /// Returns the variable's values.
    pub fn as_list(&self) -> &[WString] {
        &self.values
    }

    /// Returns the delimiter character used when converting from a list to a string.
    pub fn get_delimiter(&self) -> char {
        if self.pathvar {
            PATH_ARRAY_SEP
        } else {
            NONPATH_ARRAY_SEP
        }
    }

    /// Returns the variable's values joined with its delimiter.
    pub fn as_string(&self) -> WString {
        join_strings(&self.values, self.get_delimiter())
    }

    /// Returns whether the variable has no value, or a single empty value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() || (self.values.len() == 1 && self.values[0].is_empty())
    }
}

/// A read-only variable store. Expansion only ever queries it; every lookup may be answered from
/// whatever scoping rules the implementation applies.
pub trait Environment {
    /// Return the variable with the given name, or None if it does not exist.
    fn get(&self, name: &wstr) -> Option<EnvVar>;

    /// Return the variable with the given name, skipping variables which are missing or empty.
    fn get_unless_empty(&self, name: &wstr) -> Option<EnvVar> {
        self.get(name).filter(|var| !var.is_empty())
    }

    /// Return the current working directory, with a trailing slash.
    fn get_pwd_slash(&self) -> WString {
        let mut pwd = self
            .get(L!("PWD"))
            .map(|var| var.as_string())
            .unwrap_or_default();
        if !pwd.ends_with('/') {
            pwd.push('/');
        }
        pwd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_delimiters() {
        let var = EnvVar::new(vec![L!("a").to_owned(), L!("b").to_owned()]);
        assert_eq!(var.get_delimiter(), ' ');
        assert_eq!(var.as_string(), "a b");

        let var = EnvVar::new_pathvar(vec![L!("/bin").to_owned(), L!("/usr/bin").to_owned()]);
        assert_eq!(var.get_delimiter(), ':');
        assert_eq!(var.as_string(), "/bin:/usr/bin");
    }

    #[test]
    fn test_env_var_empty() {
        assert!(EnvVar::new(vec![]).is_empty());
        assert!(EnvVar::new(vec![WString::new()]).is_empty());
        assert!(!EnvVar::new(vec![L!("x").to_owned()]).is_empty());
        assert!(!EnvVar::new(vec![WString::new(), WString::new()]).is_empty());
    }
}
