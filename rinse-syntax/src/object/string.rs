//! Strings.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A PDF string.
///
/// The `hex` flag only records how the string was written in the source file. It is
/// ignored for equality and hashing.
#[derive(Clone, Default)]
pub struct PdfString {
    bytes: Vec<u8>,
    hex: bool,
}

impl PdfString {
    /// Create a new literal string.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: false,
        }
    }

    /// Create a new string that is preferably written in hexadecimal form.
    pub fn new_hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: true,
        }
    }

    /// Return the bytes of the string.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the bytes of the string.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }

    /// Whether the string was written in hexadecimal form.
    pub fn is_hex(&self) -> bool {
        self.hex
    }

    /// Change whether the string is written in hexadecimal form.
    pub fn set_hex(&mut self, hex: bool) {
        self.hex = hex;
    }
}

impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PdfString {}

impl Hash for PdfString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", String::from_utf8_lossy(&self.bytes))
    }
}
