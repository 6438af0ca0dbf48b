use crate::version::timestamp::Timestamp;
use std::fmt;

/// BranchId names a causally linked sequence of writes. A new one is minted every time a server
/// becomes primary for a region.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BranchId(u128);

impl BranchId {
    pub fn random() -> Self {
        loop {
            let id = rand::random::<u128>();
            if id != 0 {
                return BranchId(id);
            }
        }
    }

    pub fn nil() -> Self {
        BranchId(0)
    }

    pub fn from_u128(id: u128) -> Self {
        BranchId(id)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil")
        } else {
            write!(f, "{:08x}", (self.0 >> 96) as u32)
        }
    }
}

/// Version is a point in the history of a branch.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct Version {
    pub branch: BranchId,
    pub timestamp: Timestamp,
}

impl Version {
    pub fn new(branch: BranchId, timestamp: Timestamp) -> Self {
        Version { branch, timestamp }
    }

    /// The version of data that nobody can vouch for. It is an ancestor of every branch.
    pub fn zero() -> Self {
        Version {
            branch: BranchId::nil(),
            timestamp: Timestamp::zero(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.branch.is_nil()
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:?}", self.branch, self.timestamp)
    }
}
