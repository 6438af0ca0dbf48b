use crate::region::Region;
use crate::version::branch::Version;
use crate::version::timestamp::Timestamp;

/// VersionMap assigns a `Version` to every piece of a region. Pieces never overlap.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionMap {
    pieces: Vec<(Region, Version)>,
}

impl VersionMap {
    pub fn new(region: Region, version: Version) -> Self {
        let mut pieces = Vec::with_capacity(1);
        if !region.is_empty() {
            pieces.push((region, version));
        }

        VersionMap { pieces }
    }

    pub fn empty() -> Self {
        VersionMap { pieces: Vec::new() }
    }

    pub fn from_pieces(pieces: impl IntoIterator<Item = (Region, Version)>) -> Self {
        let mut map = VersionMap::empty();
        for (region, version) in pieces {
            map.update(&region, version);
        }

        map
    }

    /// Restricts the map to the part that lies inside `region`.
    pub fn mask(&self, region: &Region) -> VersionMap {
        let mut pieces: Vec<(Region, Version)> = self
            .pieces
            .iter()
            .filter_map(|(piece, version)| piece.intersection(region).map(|masked| (masked, *version)))
            .collect();
        pieces.sort_by(|a, b| a.0.cmp(&b.0));

        VersionMap { pieces }
    }

    /// Overwrites everything covered by `region` with `version`.
    pub fn update(&mut self, region: &Region, version: Version) {
        if region.is_empty() {
            return;
        }

        let mut pieces = Vec::with_capacity(self.pieces.len() + 1);
        for (piece, piece_version) in self.pieces.drain(..) {
            for remainder in piece.subtract(region) {
                pieces.push((remainder, piece_version));
            }
        }
        pieces.push((region.clone(), version));
        pieces.sort_by(|a, b| a.0.cmp(&b.0));

        self.pieces = pieces;
    }

    pub fn max_timestamp(&self) -> Timestamp {
        self.pieces
            .iter()
            .map(|(_, version)| version.timestamp)
            .max()
            .unwrap_or_else(Timestamp::zero)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Region, Version)> {
        self.pieces.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// True if every point of `region` has a version in this map.
    pub fn covers(&self, region: &Region) -> bool {
        let mut uncovered = vec![region.clone()];
        for (piece, _) in self.pieces.iter() {
            uncovered = uncovered.iter().flat_map(|u| u.subtract(piece)).collect();
            if uncovered.is_empty() {
                return true;
            }
        }

        uncovered.iter().all(|u| u.is_empty())
    }

    /// Returns the version if the whole map agrees on one.
    pub fn single_version(&self) -> Option<Version> {
        let first = self.pieces.first()?.1;
        if self.pieces.iter().all(|(_, version)| *version == first) {
            Some(first)
        } else {
            None
        }
    }
}
