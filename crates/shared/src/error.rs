use std::fmt;

use thiserror::Error;

/// Model output that could not be turned into a portable JSON value.
///
/// Always scoped to a single window or stage call; callers catch it and fall
/// back to unannotated data.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("{context}: model output is not valid JSON5: {message}")]
    Syntax {
        context: String,
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("{context}: parsed value cannot be encoded as strict JSON: {message}")]
    NotPortable { context: String, message: String },

    #[error("{context}: expected a JSON {expected}, found {found}")]
    UnexpectedShape {
        context: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl ExtractionError {
    pub fn context(&self) -> &str {
        match self {
            Self::Syntax { context, .. }
            | Self::NotPortable { context, .. }
            | Self::UnexpectedShape { context, .. } => context,
        }
    }
}

/// A well-formed reply whose entries do not line up with the window they
/// describe. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationWarning {
    MissingIndex {
        window: usize,
        position: usize,
        title: String,
    },
    IndexOutOfRange {
        window: usize,
        index: i64,
        window_len: usize,
    },
    NonIntegerIndex {
        window: usize,
        raw: String,
    },
    MissingIndexField {
        window: usize,
        entry: usize,
    },
    DuplicateIndex {
        window: usize,
        index: usize,
    },
    NotAnObject {
        window: usize,
        entry: usize,
    },
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIndex {
                window,
                position,
                title,
            } => write!(
                f,
                "window {window}: no annotation for position {position} (\"{title}\")"
            ),
            Self::IndexOutOfRange {
                window,
                index,
                window_len,
            } => write!(
                f,
                "window {window}: index {index} outside 0..{window_len}, entry dropped"
            ),
            Self::NonIntegerIndex { window, raw } => {
                write!(f, "window {window}: non-integer index {raw}, entry dropped")
            }
            Self::MissingIndexField { window, entry } => {
                write!(f, "window {window}: entry {entry} has no index, dropped")
            }
            Self::DuplicateIndex { window, index } => {
                write!(f, "window {window}: index {index} repeated, later entry dropped")
            }
            Self::NotAnObject { window, entry } => {
                write!(f, "window {window}: entry {entry} is not an object, dropped")
            }
        }
    }
}

/// Curation or insight synthesis failed as a whole. The stage returns its
/// empty value and the run continues.
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("curation failed: {0:#}")]
    Curation(anyhow::Error),

    #[error("insight synthesis failed: {0:#}")]
    Insight(anyhow::Error),
}

/// Missing or malformed configuration detected before any stage runs.
#[derive(Error, Debug)]
pub enum FatalPrecondition {
    #[error("{name} not found.\n\n{hint}")]
    MissingSetting { name: &'static str, hint: String },

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },
}
