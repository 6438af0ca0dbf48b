use crate::region::Region;
use crate::version::branch::{BranchId, Version};
use crate::version::timestamp::Timestamp;
use crate::version::version_map::VersionMap;
use std::collections::HashMap;
use std::sync::Mutex;

/// BranchBirthCertificate describes where a branch came from. It is created exactly once by the
/// primary that mints the branch.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchBirthCertificate {
    pub branch_id: BranchId,
    pub origin: VersionMap,
    pub region: Region,
    pub initial_timestamp: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum BranchHistoryError {
    #[error("No birth certificate is known for branch {0:?}")]
    MissingCertificate(BranchId),
    #[error("Branch {0:?} is already recorded with a different birth certificate")]
    ConflictingCertificate(BranchId),
}

/// BranchHistory is the set of birth certificates a server knows about.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BranchHistory {
    branches: HashMap<BranchId, BranchBirthCertificate>,
}

impl BranchHistory {
    pub fn new() -> Self {
        BranchHistory::default()
    }

    pub fn get(&self, branch_id: &BranchId) -> Option<&BranchBirthCertificate> {
        self.branches.get(branch_id)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BranchBirthCertificate> {
        self.branches.values()
    }

    pub fn insert(&mut self, certificate: BranchBirthCertificate) -> Result<(), BranchHistoryError> {
        match self.branches.get(&certificate.branch_id) {
            Some(existing) if *existing != certificate => {
                Err(BranchHistoryError::ConflictingCertificate(certificate.branch_id))
            }
            Some(_) => Ok(()),
            None => {
                self.branches.insert(certificate.branch_id, certificate);
                Ok(())
            }
        }
    }

    pub fn merge(&mut self, other: &BranchHistory) -> Result<(), BranchHistoryError> {
        for certificate in other.branches.values() {
            self.insert(certificate.clone())?;
        }

        Ok(())
    }

    /// Returns true if the data at `version` is an ancestor of `branch` over all of `region`.
    /// Walks the origins of `branch` backwards until it reaches `version.branch`.
    pub fn version_is_ancestor(
        &self,
        version: &Version,
        branch: BranchId,
        region: &Region,
    ) -> Result<bool, BranchHistoryError> {
        if version.is_zero() || version.branch == branch {
            return Ok(true);
        }
        if branch.is_nil() {
            return Ok(false);
        }

        let certificate = self
            .branches
            .get(&branch)
            .ok_or(BranchHistoryError::MissingCertificate(branch))?;

        let origin = certificate.origin.mask(region);
        if !origin.covers(region) {
            // Whatever the origin leaves out came from nothing.
            return Ok(false);
        }

        for (piece, origin_version) in origin.iter() {
            if origin_version.branch == version.branch {
                if version.timestamp > origin_version.timestamp {
                    return Ok(false);
                }
            } else if !self.version_is_ancestor(version, origin_version.branch, piece)? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// BranchHistoryStore keeps birth certificates. A certificate must be recorded before the branch
/// it describes is used for any write.
pub trait BranchHistoryStore: Send + Sync {
    fn record(&self, certificate: BranchBirthCertificate) -> Result<(), BranchHistoryError>;

    fn merge(&self, history: &BranchHistory) -> Result<(), BranchHistoryError>;

    fn snapshot(&self) -> BranchHistory;
}

// Currently, this is not persistent. It's just in memory.
// TODO:3 Persist branch history next to the store's metainfo so it survives restarts.
pub struct VolatileBranchHistoryStore {
    history: Mutex<BranchHistory>,
}

impl VolatileBranchHistoryStore {
    pub fn new() -> Self {
        VolatileBranchHistoryStore {
            history: Mutex::new(BranchHistory::new()),
        }
    }
}

impl BranchHistoryStore for VolatileBranchHistoryStore {
    fn record(&self, certificate: BranchBirthCertificate) -> Result<(), BranchHistoryError> {
        self.history
            .lock()
            .expect("VolatileBranchHistoryStore.record() mutex guard poison")
            .insert(certificate)
    }

    fn merge(&self, history: &BranchHistory) -> Result<(), BranchHistoryError> {
        self.history
            .lock()
            .expect("VolatileBranchHistoryStore.merge() mutex guard poison")
            .merge(history)
    }

    fn snapshot(&self) -> BranchHistory {
        self.history
            .lock()
            .expect("VolatileBranchHistoryStore.snapshot() mutex guard poison")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certificate(branch_id: BranchId, origin: VersionMap) -> BranchBirthCertificate {
        BranchBirthCertificate {
            branch_id,
            initial_timestamp: origin.max_timestamp(),
            origin,
            region: Region::universe(),
        }
    }

    #[test]
    fn ancestry_through_origins() {
        // -- setup --
        let b1 = BranchId::random();
        let b2 = BranchId::random();
        let b3 = BranchId::random();
        let mut history = BranchHistory::new();
        history
            .insert(certificate(b1, VersionMap::new(Region::universe(), Version::zero())))
            .unwrap();
        history
            .insert(certificate(
                b2,
                VersionMap::new(Region::universe(), Version::new(b1, Timestamp::new(10))),
            ))
            .unwrap();
        let region = Region::universe();

        // -- verify --
        assert!(history.version_is_ancestor(&Version::zero(), b2, &region).unwrap());
        assert!(history
            .version_is_ancestor(&Version::new(b1, Timestamp::new(10)), b2, &region)
            .unwrap());
        assert!(history
            .version_is_ancestor(&Version::new(b1, Timestamp::new(3)), b2, &region)
            .unwrap());
        assert!(!history
            .version_is_ancestor(&Version::new(b1, Timestamp::new(11)), b2, &region)
            .unwrap());
        assert!(history
            .version_is_ancestor(&Version::new(b2, Timestamp::new(99)), b2, &region)
            .unwrap());

        match history.version_is_ancestor(&Version::new(b1, Timestamp::new(1)), b3, &region) {
            Err(BranchHistoryError::MissingCertificate(missing)) => assert_eq!(missing, b3),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn conflicting_certificates_are_rejected() {
        let b1 = BranchId::random();
        let store = VolatileBranchHistoryStore::new();
        store
            .record(certificate(b1, VersionMap::new(Region::universe(), Version::zero())))
            .unwrap();
        store
            .record(certificate(b1, VersionMap::new(Region::universe(), Version::zero())))
            .unwrap();

        let conflicting = BranchBirthCertificate {
            initial_timestamp: Timestamp::new(4),
            ..certificate(b1, VersionMap::new(Region::universe(), Version::zero()))
        };
        assert!(matches!(
            store.record(conflicting),
            Err(BranchHistoryError::ConflictingCertificate(_))
        ));
        assert_eq!(store.snapshot().len(), 1);
    }
}
