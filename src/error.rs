//! Typed failures shared by the registry, the JSON store, and the SQLite
//! repository. Callers (a GUI, the bundled CLI) match on the variant to decide
//! what to tell the user; nothing below this layer swallows an error.

use std::fmt;

use thiserror::Error;

/// Which table or map an id belongs to. Used both for error messages and for
/// `list_all` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Student,
    Instructor,
    Course,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Student => "student",
            EntityKind::Instructor => "instructor",
            EntityKind::Course => "course",
        };
        f.pad(label)
    }
}

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} {id} already exists")]
    DuplicateKey { kind: EntityKind, id: String },

    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistrarError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        RegistrarError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: &str) -> Self {
        RegistrarError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(kind: EntityKind, id: &str) -> Self {
        RegistrarError::DuplicateKey {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result alias used by every library function.
pub type Result<T> = std::result::Result<T, RegistrarError>;
