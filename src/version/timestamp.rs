use std::fmt;

/// Timestamp orders the writes of a single branch. Every write dispatched by a primary gets the
/// next timestamp of its branch.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(value: u64) -> Self {
        Timestamp(value)
    }

    pub fn zero() -> Self {
        Timestamp(0)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Timestamp(self.0 + 1)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
