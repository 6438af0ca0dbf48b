use crate::query::{Durability, Read, ReadResponse, Write, WriteResponse};
use crate::region::{Key, Region};
use crate::version::{Version, VersionMap};
use bytes::Bytes;

/// ReadToken is a ticket for one read against a `Store`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct ReadToken(pub(crate) u64);

/// WriteToken is a ticket for one write against a `Store`. Each token can be used once.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct WriteToken(pub(crate) u64);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Key {0:?} is outside of region {1:?}")]
    KeyOutsideRegion(Key, Region),
    #[error("Region {0:?} is not owned by this store")]
    RegionNotOwned(Region),
    #[error("Storage failure: {0}")]
    Io(String),
}

/// BackfillChunk carries every document in `(after, last_key]` of a region, or in `(after, +inf)`
/// when `done` is set.
#[derive(Clone, Debug, PartialEq)]
pub struct BackfillChunk {
    pub after: Option<Key>,
    pub items: Vec<(Key, Bytes)>,
    pub last_key: Option<Key>,
    pub done: bool,
}

impl BackfillChunk {
    /// True if `key` falls into the key interval this chunk is authoritative for.
    pub fn covers_key(&self, key: &Key) -> bool {
        if let Some(after) = &self.after {
            if key <= after {
                return false;
            }
        }

        match (&self.last_key, self.done) {
            (_, true) => true,
            (Some(last_key), false) => key <= last_key,
            (None, false) => false,
        }
    }
}

/// Store is the place versions and bytes live. Replication only needs these primitives from it.
///
/// `write` must update the data and the metainfo atomically, and must not return before the write
/// is flushed when asked for `Durability::Hard`.
pub trait Store: Send + Sync {
    fn new_read_token(&self) -> ReadToken;

    fn new_write_token(&self) -> WriteToken;

    /// Returns the version map of the store restricted to `region`.
    fn get_metainfo(&self, region: &Region) -> Result<VersionMap, StoreError>;

    fn set_metainfo(&self, token: WriteToken, region: &Region, version: Version) -> Result<(), StoreError>;

    fn read(&self, token: ReadToken, region: &Region, read: &Read) -> Result<ReadResponse, StoreError>;

    fn write(
        &self,
        token: WriteToken,
        region: &Region,
        write: &Write,
        new_version: Version,
        durability: Durability,
    ) -> Result<WriteResponse, StoreError>;

    /// Returns up to `limit` documents of `region` whose key is greater than `after`, ordered by key.
    fn backfill_chunk(&self, region: &Region, after: Option<&Key>, limit: usize) -> Result<BackfillChunk, StoreError>;

    /// Makes the chunk's key interval of `region` equal to the chunk: drops what is not in it and
    /// stores what is.
    fn apply_backfill_chunk(&self, token: WriteToken, region: &Region, chunk: &BackfillChunk) -> Result<(), StoreError>;
}
