//! Object references.

use std::fmt;

/// A reference to an indirect object, made up of an object number and a generation number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjRef {
    /// The object number.
    pub num: u32,
    /// The generation number.
    pub generation: u16,
}

impl ObjRef {
    /// Create a new object reference.
    #[inline]
    pub const fn new(num: u32, generation: u16) -> Self {
        Self { num, generation }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}
