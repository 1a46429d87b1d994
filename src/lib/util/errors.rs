//! The crate-wide error taxonomy.
//!
//! Every fallible operation in `pkgctl` returns `Res<T>` = `Result<T, Error>`.
//! `Error` wraps a `failure::Context<ErrorKind>` so that a lower-level cause
//! (an `io::Error`, a `git2::Error`, ...) can be attached via `.context(...)`
//! while callers match on the stable `ErrorKind` variant.

use failure::{Backtrace, Context, Fail};
use std::fmt;

pub type Res<T> = Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "package not found: {}", _0)]
    NotFound(String),

    #[fail(display = "could not parse catalog entry: {}", _0)]
    Parse(String),

    #[fail(display = "network operation failed: {}", _0)]
    Network(String),

    #[fail(display = "checksum mismatch for {}", _0)]
    IntegrityMismatch(String),

    #[fail(display = "build command failed: {}", _0)]
    Build(String),

    #[fail(display = "conflicts with installed package: {}", _0)]
    Conflict(String),

    #[fail(display = "dependency cycle detected involving: {}", _0)]
    Cycle(String),

    #[fail(display = "blocked by dependents: {}", _0)]
    Dependency(String),

    #[fail(display = "another instance is already running (lock held at {})", _0)]
    Locked(String),

    #[fail(display = "resource exhausted: {}", _0)]
    Resource(String),

    #[fail(display = "I/O error: {}", _0)]
    Io(String),

    #[fail(display = "operation cancelled")]
    Cancelled,

    #[fail(display = "unsupported archive format: {}", _0)]
    UnsupportedFormat(String),

    #[fail(display = "extraction failed: {}", _0)]
    Extract(String),
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.inner.get_context()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error { inner }
    }
}

impl From<::std::io::Error> for Error {
    fn from(err: ::std::io::Error) -> Error {
        Error {
            inner: err.context(ErrorKind::Io(format!("{}", err))),
        }
    }
}

/// Ext trait mirroring `failure::ResultExt` but surfacing straight to our
/// `ErrorKind`, used in places where the teacher's `.context(ErrorKind::X)`
/// pattern would otherwise need an extra `use failure::ResultExt` at every
/// call site.
pub trait ResultExt<T, E> {
    fn ctx(self, kind: ErrorKind) -> Result<T, Error>;
}

impl<T, E: Fail> ResultExt<T, E> for Result<T, E> {
    fn ctx(self, kind: ErrorKind) -> Result<T, Error> {
        self.map_err(|e| Error {
            inner: e.context(kind),
        })
    }
}
