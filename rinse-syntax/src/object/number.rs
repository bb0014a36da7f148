//! Numbers.

use std::hash::{Hash, Hasher};

/// A PDF number, either an integer or a real.
#[derive(Debug, Copy, Clone)]
pub enum Number {
    /// An integer number.
    Integer(i64),
    /// A real number.
    Real(f64),
}

impl Number {
    /// Returns the number as an `f64`.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Integer(i) => i as f64,
            Self::Real(r) => r,
        }
    }

    /// Returns the number as an `i64`, if it is integral.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Integer(i) => Some(i),
            Self::Real(r) => integral(r),
        }
    }
}

// Reals with an integral value are treated as the corresponding integer, so that `1` and
// `1.0` compare and hash the same.
fn integral(r: f64) -> Option<i64> {
    (r.fract() == 0.0 && r >= i64::MIN as f64 && r <= i64::MAX as f64).then_some(r as i64)
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_i64(), other.as_i64()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.as_f64().to_bits() == other.as_f64().to_bits(),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_i64() {
            Some(i) => {
                0_u8.hash(state);
                i.hash(state);
            }
            None => {
                1_u8.hash(state);
                self.as_f64().to_bits().hash(state);
            }
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}
