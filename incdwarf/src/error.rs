//! The error type shared by all emitter operations.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use thiserror::Error;

/// The error kind for [`Error`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A read or write through the container failed or came up short.
    InputOutput,

    /// A declaration was committed or freed without being initialized first.
    UnknownDecl(u32),

    /// The container does not carry the requested debug section.
    SectionMissing,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputOutput => write!(f, "debug section input/output failed"),
            Self::UnknownDecl(index) => {
                write!(f, "declaration {index} has no debug information state")
            }
            Self::SectionMissing => write!(f, "container is missing a debug section"),
        }
    }
}

/// An error returned while emitting or patching debug information.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a new error from a known kind as well as an arbitrary error
    /// payload.
    pub(crate) fn new<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(ErrorKind::InputOutput, e)
    }
}
