//! Rich diagnostic error types for the cmdstack engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so content authors know exactly which
//! command set is broken and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::state::StateError;

/// Top-level error type for the cmdstack engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum CmdError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    CommandSet(#[from] CommandSetError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateError),
}

// ---------------------------------------------------------------------------
// Command set construction errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum CommandSetError {
    #[error("duplicate command name \"{name}\" in set \"{set}\": claimed by \"{existing}\" and \"{incoming}\"")]
    #[diagnostic(
        code(cmdstack::cmdset::duplicate_key),
        help(
            "Within one command set every key and alias must be unique. \
             Rename one of the commands, drop the clashing alias, or move one \
             command into a separate set and let the merge rules decide."
        )
    )]
    DuplicateKey {
        set: String,
        name: String,
        existing: String,
        incoming: String,
    },

    #[error("command in set \"{set}\" has an empty key")]
    #[diagnostic(
        code(cmdstack::cmdset::empty_key),
        help("Every command needs a non-blank key; aliases alone are not enough.")
    )]
    EmptyKey { set: String },
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum MergeError {
    #[error("ambiguous command \"{key}\": \"{overlay}\" and \"{base}\" both define it at equal priority")]
    #[diagnostic(
        code(cmdstack::merge::ambiguous_command),
        help(
            "The merging set uses duplicate_policy = \"error\", so equal-priority \
             collisions are reported instead of resolved. Raise one set's priority, \
             rename the command, or switch the policy to \"keep-newest\"."
        )
    )]
    AmbiguousCommand {
        key: String,
        names: Vec<String>,
        base: String,
        overlay: String,
    },
}

/// Convenience result type for the engine.
pub type CmdResult<T> = std::result::Result<T, CmdError>;

/// Result type for command set construction.
pub type CommandSetResult<T> = std::result::Result<T, CommandSetError>;
