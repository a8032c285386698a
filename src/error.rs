//! Centralized error handling for Unkeyed.
//!
//! All failure conditions are propagated through the [`Result`] type; the
//! library never panics on malformed input (enforced by clippy lints at the
//! crate root).
//!
//! ## Error Categories
//!
//! Errors are categorized by their domain:
//!
//! - **I/O Errors** ([`UnkeyedError::Io`]): Low-level file system operations
//! - **Format Errors** ([`UnkeyedError::Format`]): Corrupt or truncated containers
//! - **Archive Errors** ([`UnkeyedError::NotAnArchive`],
//!   [`UnkeyedError::UnresolvedReference`], [`UnkeyedError::CyclicReference`],
//!   [`UnkeyedError::RecursionLimit`]): Structural problems in the keyed archive
//! - **Encode Errors** ([`UnkeyedError::Encode`]): The resolved document cannot
//!   be written by the strict encoder
//!
//! ## Cloneability
//!
//! [`UnkeyedError`] is `Clone` so that per-root failures can be both embedded
//! in the conversion report and returned to the caller. I/O errors are wrapped
//! in `Arc` to make cloning cheap.
//!
//! ## Usage
//!
//! ```rust
//! use unkeyed::UnkeyedError;
//!
//! fn check(err: &UnkeyedError) {
//!     match err {
//!         UnkeyedError::UnresolvedReference { index } => {
//!             eprintln!("reference {index} falls outside the object table");
//!         }
//!         other => eprintln!("{other}"),
//!     }
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Unkeyed operations.
pub type Result<T> = std::result::Result<T, UnkeyedError>;

/// The master error enum covering all failure domains in Unkeyed.
#[derive(Debug, Clone)]
pub enum UnkeyedError {
    /// Low-level I/O failure (file not found, permissions, disk full, ...).
    ///
    /// The underlying `io::Error` is wrapped in an `Arc` to keep the error
    /// `Clone`.
    Io(Arc<io::Error>),

    /// The container is not a valid property list: wrong magic bytes, a
    /// truncated trailer or offset table, an unknown object marker, or an
    /// XML document that does not follow the plist DTD subset.
    ///
    /// The string describes the specific violation.
    Format(String),

    /// The container decoded fine but carries no `$top` entry, so it is not
    /// a keyed archive and no roots can be located.
    NotAnArchive,

    /// A reference points outside the object table.
    ///
    /// Reported with the offending table index. This aborts resolution of
    /// the current root only; sibling roots are unaffected.
    UnresolvedReference {
        /// The out-of-range table index.
        index: u64,
    },

    /// An entry references itself, directly or through a chain of other
    /// entries. The naive recursive walk would never terminate on such an
    /// archive, so the cycle is detected and reported instead.
    CyclicReference {
        /// The table index at which the cycle closed.
        index: u64,
    },

    /// Resolution exceeded the defensive depth ceiling.
    ///
    /// Distinct from cycle detection: a very long acyclic reference chain
    /// could exhaust the call stack before any cycle is seen.
    RecursionLimit(usize),

    /// The resolved document contains a shape the strict encoder rejects
    /// (a bare null value). The caller retries once with the lenient
    /// encoder before surfacing this as fatal.
    Encode(String),
}

impl fmt::Display for UnkeyedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Format(s) => write!(f, "format error: {s}"),
            Self::NotAnArchive => write!(f, "no $top entry found; not a keyed archive"),
            Self::UnresolvedReference { index } => {
                write!(f, "reference {index} is outside the object table")
            }
            Self::CyclicReference { index } => {
                write!(f, "cyclic reference through table entry {index}")
            }
            Self::RecursionLimit(limit) => {
                write!(f, "resolution exceeded the depth ceiling of {limit}")
            }
            Self::Encode(s) => write!(f, "encode error: {s}"),
        }
    }
}

impl std::error::Error for UnkeyedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for UnkeyedError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
