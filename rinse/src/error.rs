//! Fatal errors and recoverable diagnostics.

use log::warn;
use rinse_syntax::LoadError;
use rinse_syntax::object::ObjRef;
use std::fmt;
use std::io;
use thiserror::Error;

/// A result type using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// An error that aborts cleaning a document. No output is written if one occurs.
#[derive(Error, Debug)]
pub enum Error {
    /// The input could not be parsed, not even by scanning for objects.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// A requested page does not exist.
    #[error("page {page} is out of range, the document has {count} pages")]
    PageRange {
        /// The requested 1-based page index.
        page: usize,
        /// The number of pages in the document.
        count: usize,
    },
    /// The input is encrypted and the supplied password is neither the user nor the owner
    /// password.
    #[error("the supplied password is incorrect")]
    Authentication,
    /// The encryption options are inconsistent.
    #[error("invalid encryption configuration: {0}")]
    EncryptionConfig(String),
    /// Reading the input or writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Malformed(reason) => Self::MalformedDocument(reason),
            LoadError::Authentication => Self::Authentication,
            LoadError::UnsupportedEncryption => {
                Self::MalformedDocument("unsupported security handler".to_string())
            }
        }
    }
}

/// A problem that was worked around while cleaning a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A stream uses a filter that can't be decoded, so it was left as it is.
    UnsupportedFilter {
        /// The stream.
        object: ObjRef,
        /// The name of the filter.
        filter: String,
    },
    /// No appearance stream can be generated for this annotation subtype.
    UnsupportedAnnotationSubtype {
        /// The annotation, or the page holding it if it is a direct object.
        object: ObjRef,
        /// The subtype.
        subtype: String,
    },
    /// Operators were dropped from a content stream.
    ContentRepaired {
        /// The content stream.
        object: ObjRef,
        /// The number of dropped operators and operands.
        dropped: usize,
    },
    /// The cross-reference information was broken and was reconstructed.
    Repaired,
    /// Linearization was requested, which is not supported.
    LinearizationUnsupported,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFilter { object, filter } => {
                write!(f, "stream {object} uses unsupported filter /{filter}")
            }
            Self::UnsupportedAnnotationSubtype { object, subtype } => {
                write!(f, "cannot generate an appearance for /{subtype} annotation {object}")
            }
            Self::ContentRepaired { object, dropped } => {
                write!(f, "dropped {dropped} tokens from content stream {object}")
            }
            Self::Repaired => write!(f, "the document was repaired"),
            Self::LinearizationUnsupported => {
                write!(f, "linearization is not supported, writing a regular file")
            }
        }
    }
}

/// The diagnostics collected while cleaning a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Record a diagnostic. It is logged as a warning.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.0.push(diagnostic);
    }

    /// The number of diagnostics.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no diagnostic was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the diagnostics in the order they were recorded.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// The diagnostics as a slice.
    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
