//! Error types with source location tracking.
//!
//! Every error raised by the compiler front end carries a [`Location`]
//! naming the file, line and column of the offending token, plus an
//! [`ErrorKind`] that classifies the failure. This enables precise,
//! contextual diagnostics on stderr.
//!
//! # Example
//!
//! ```
//! use sdvidl_base::{CompileError, ErrorKind, Location};
//!
//! let err = CompileError::new(
//!     ErrorKind::Lex,
//!     "unterminated string literal",
//!     Location::new("signals.idl", 12, 5),
//! );
//! assert!(err.to_string().contains("signals.idl:12:5"));
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

/// Classification of a front-end failure.
///
/// The set is closed: each variant corresponds to one row of the error
/// table in the compiler documentation. All of them are fatal for the
/// compilation unit that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cannot open or read a source or include file.
    Io,
    /// Invalid UTF sequence during BOM-guided transcoding.
    Encoding,
    /// Malformed token, unterminated string or comment, invalid escape.
    Lex,
    /// Identifier differs from a reserved keyword only in case while the
    /// case-sensitive extension is off.
    CaseCollision,
    /// Unrecognised `#xxx` directive.
    UnknownDirective,
    /// `#pragma` or another directive that is recognised but not supported.
    UnsupportedDirective,
    /// `#else`/`#elif`/`#endif` without a matching `#if`, duplicated `#else`,
    /// EOF within `#verbatim_begin`, or a missing `#endif`.
    UnbalancedDirective,
    /// `#define` conflicting with an existing macro of different content.
    Redefinition,
    /// Wrong macro argument count or duplicate parameter name.
    MacroArity,
    /// No candidate path exists for an `#include`.
    IncludeNotFound,
    /// Literal value exceeds the largest native bucket, or a fixed-point
    /// value is out of range.
    Range,
    /// Division or modulo by zero inside a `#if` expression.
    DivByZero,
    /// Invariant violation; never expected from well-formed input.
    Internal,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Io => "I/O error",
            ErrorKind::Encoding => "encoding error",
            ErrorKind::Lex => "lexical error",
            ErrorKind::CaseCollision => "case collision",
            ErrorKind::UnknownDirective => "unknown directive",
            ErrorKind::UnsupportedDirective => "unsupported directive",
            ErrorKind::UnbalancedDirective => "unbalanced directive",
            ErrorKind::Redefinition => "macro redefinition",
            ErrorKind::MacroArity => "macro arity error",
            ErrorKind::IncludeNotFound => "include not found",
            ErrorKind::Range => "range error",
            ErrorKind::DivByZero => "division by zero",
            ErrorKind::Internal => "internal error",
        }
    }
}

/// A file/line/column triple.
///
/// Lines and columns are 1-based; a zero line means "no position" (used for
/// errors raised before any source text has been read, e.g. command-line
/// definition failures).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// Path of the source file the error occurred in.
    pub path: PathBuf,
    /// 1-based line number, 0 when unknown.
    pub line: u32,
    /// 1-based column number, 0 when unknown.
    pub col: u32,
}

impl Location {
    /// Creates a location from a path and 1-based line/column.
    pub fn new(path: impl AsRef<Path>, line: u32, col: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            line,
            col,
        }
    }

    /// A location naming only a file, without line/column information.
    pub fn file_only(path: impl AsRef<Path>) -> Self {
        Self::new(path, 0, 0)
    }

    /// Returns `true` when the location carries no position at all.
    pub fn is_unknown(&self) -> bool {
        self.path.as_os_str().is_empty() && self.line == 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}:{}", self.path.display(), self.line, self.col)
        } else {
            write!(f, "{}", self.path.display())
        }
    }
}

/// An error annotated with its kind and source location.
///
/// The display format is `{kind}: {message} ({location})`, or just
/// `{kind}: {message}` when no location is known.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Human-readable error description.
    pub message: String,
    /// Where in the compilation unit the error occurred.
    pub location: Location,
}

impl CompileError {
    /// Creates an error with the given kind, message and source location.
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }

    /// Creates an error without position information.
    pub fn bare(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, Location::default())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_unknown() {
            write!(f, "{}: {}", self.kind.as_str(), self.message)
        } else {
            write!(f, "{}: {} ({})", self.kind.as_str(), self.message, self.location)
        }
    }
}

impl std::error::Error for CompileError {}

/// Alias for `std::result::Result<T, CompileError>`.
///
/// Use this as the return type for fallible operations in the front end.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_kind_message_and_location() {
        let err = CompileError::new(
            ErrorKind::DivByZero,
            "division by zero",
            Location::new("door.idl", 3, 9),
        );
        let text = err.to_string();
        assert!(text.contains("division by zero"));
        assert!(text.contains("door.idl:3:9"));
    }

    #[test]
    fn bare_error_omits_location() {
        let err = CompileError::bare(ErrorKind::Io, "cannot open file");
        assert_eq!(err.to_string(), "I/O error: cannot open file");
    }

    #[test]
    fn file_only_location_has_no_line() {
        let loc = Location::file_only("vss.idl");
        assert_eq!(loc.to_string(), "vss.idl");
        assert!(!loc.is_unknown());
    }
}
