//! Argument expansion for an interactive command shell.
//!
//! This crate takes a single raw argument token, as produced by the outer
//! command-line parser, and rewrites it into the list of concrete argument
//! strings used for execution, completion, or assignment. Expansion runs as a
//! pipeline of five stages: command substitution, variable substitution,
//! brace expansion, home directory and %self expansion, and wildcard/path
//! expansion. See [`expand::expand_string`] for the entry point.
//!
//! The crate performs no tokenization and launches no processes. Everything
//! with an externally observable effect (executing a command substitution,
//! globbing the filesystem, reading history, resolving users) goes through
//! the collaborator traits bundled in [`operation_context::OperationContext`].

#![allow(non_camel_case_types)]

pub mod common;
pub mod complete;
pub mod env;
pub mod exec;
pub mod expand;
pub mod history;
pub mod operation_context;
pub mod parse_constants;
pub mod parse_util;
pub mod path;
pub mod sentinel;
pub mod users;
pub mod util;
pub mod wchar;
pub mod wchar_ext;
pub mod wcstoi;
pub mod wcstringutil;
pub mod wildcard;

#[cfg(test)]
mod tests;
