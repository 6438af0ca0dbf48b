use crate::region::key::{Key, HASH_SPACE};
use std::cmp;
use std::fmt;

/// HashRange is the half-open range `[beg, end)` of key hashes.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct HashRange {
    pub beg: u64,
    pub end: u64,
}

impl HashRange {
    pub fn new(beg: u64, end: u64) -> Self {
        assert!(beg <= end, "HashRange beg ({}) must not exceed end ({})", beg, end);
        assert!(end <= HASH_SPACE, "HashRange end ({}) is outside of the hash space", end);
        HashRange { beg, end }
    }

    pub fn universe() -> Self {
        HashRange { beg: 0, end: HASH_SPACE }
    }

    pub fn is_empty(&self) -> bool {
        self.beg >= self.end
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.beg <= hash && hash < self.end
    }

    fn intersection(&self, other: &HashRange) -> HashRange {
        let beg = cmp::max(self.beg, other.beg);
        let end = cmp::max(beg, cmp::min(self.end, other.end));
        HashRange { beg, end }
    }
}

/// KeyRange is the half-open range `[left, right)` of keys. `right == None` is unbounded.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct KeyRange {
    pub left: Key,
    pub right: Option<Key>,
}

impl KeyRange {
    pub fn new(left: Key, right: Option<Key>) -> Self {
        KeyRange { left, right }
    }

    pub fn universe() -> Self {
        KeyRange {
            left: Key::min(),
            right: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(&self.right, Some(right) if *right <= self.left)
    }

    pub fn contains(&self, key: &Key) -> bool {
        if *key < self.left {
            return false;
        }

        match &self.right {
            None => true,
            Some(right) => key < right,
        }
    }

    fn intersection(&self, other: &KeyRange) -> KeyRange {
        let left = cmp::max(&self.left, &other.left).clone();
        let right = match (&self.right, &other.right) {
            (None, None) => None,
            (Some(r), None) | (None, Some(r)) => Some(r.clone()),
            (Some(r1), Some(r2)) => Some(cmp::min(r1, r2).clone()),
        };

        KeyRange { left, right }
    }
}

/// Region is a shard: the rectangle of keys whose hash falls into `hash` and whose value falls
/// into `keys`.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Region {
    pub hash: HashRange,
    pub keys: KeyRange,
}

impl Region {
    pub fn new(hash: HashRange, keys: KeyRange) -> Self {
        Region { hash, keys }
    }

    pub fn universe() -> Self {
        Region {
            hash: HashRange::universe(),
            keys: KeyRange::universe(),
        }
    }

    /// Region covering every hash of the key range `[left, right)`.
    pub fn from_key_range(left: Key, right: Option<Key>) -> Self {
        Region {
            hash: HashRange::universe(),
            keys: KeyRange::new(left, right),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty() || self.keys.is_empty()
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.keys.contains(key) && self.hash.contains(key.hash_value())
    }

    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let candidate = Region {
            hash: self.hash.intersection(&other.hash),
            keys: self.keys.intersection(&other.keys),
        };

        if candidate.is_empty() {
            None
        } else {
            Some(candidate)
        }
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.intersection(other).is_some()
    }

    pub fn is_superset_of(&self, other: &Region) -> bool {
        other.is_empty() || self.intersection(other).as_ref() == Some(other)
    }

    /// Returns the disjoint pieces of `self` that are not covered by `other`. At most four.
    pub fn subtract(&self, other: &Region) -> Vec<Region> {
        let overlap = match self.intersection(other) {
            None => return vec![self.clone()],
            Some(overlap) => overlap,
        };

        let mut pieces = Vec::with_capacity(4);

        // Hash slices above and below the overlap, spanning all of our keys.
        let below = Region::new(HashRange::new(self.hash.beg, overlap.hash.beg), self.keys.clone());
        let above = Region::new(HashRange::new(overlap.hash.end, self.hash.end), self.keys.clone());

        // Key slices left and right of the overlap, within the overlap's hash slice.
        let left = Region::new(
            overlap.hash,
            KeyRange::new(self.keys.left.clone(), Some(overlap.keys.left.clone())),
        );
        let right = match &overlap.keys.right {
            None => None,
            Some(overlap_right) => Some(Region::new(
                overlap.hash,
                KeyRange::new(overlap_right.clone(), self.keys.right.clone()),
            )),
        };

        for piece in vec![Some(below), Some(above), Some(left), right].into_iter().flatten() {
            if !piece.is_empty() {
                pieces.push(piece);
            }
        }

        pieces
    }
}

impl fmt::Debug for HashRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#[{:x}, {:x})", self.beg, self.end)
    }
}

impl fmt::Debug for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.right {
            None => write!(f, "[{:?}, +inf)", self.left),
            Some(right) => write!(f, "[{:?}, {:?})", self.left, right),
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}x{:?}", self.hash, self.keys)
    }
}
