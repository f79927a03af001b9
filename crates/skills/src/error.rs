use std::{collections::TryReserveError, path::PathBuf};

use crate::types::ToolKind;

/// Which kind of named entry a lookup or insertion was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Skill,
    Tool,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skill => f.write_str("skill"),
            Self::Tool => f.write_str("tool"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntryKind, name: String },
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: EntryKind, name: String },
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("out of memory while growing the {0}")]
    OutOfMemory(&'static str),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("tool kind '{0}' has no execution strategy")]
    NotImplemented(ToolKind),
    #[error("malformed {format} manifest: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
    #[error("skill registry is not initialized")]
    NotInitialized,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn skill_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntryKind::Skill,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntryKind::Tool,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn skill_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: EntryKind::Skill,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn tool_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: EntryKind::Tool,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::FileNotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Allocation failures abort bulk operations instead of being skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory(_))
    }

    pub(crate) fn out_of_memory(what: &'static str) -> impl FnOnce(TryReserveError) -> Self {
        move |_| Self::OutOfMemory(what)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// `.context()` / `.with_context()` for results and options whose error
/// should collapse into [`Error::Message`].
pub trait Context<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        let ctx = context.into();
        self.map_err(|source| Error::message(format!("{ctx}: {source}")))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|source| Error::message(format!("{}: {source}", f().into())))
    }
}

impl<T> Context<T> for Option<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| Error::message(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::message(f()))
    }
}
