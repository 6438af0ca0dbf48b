use crate::query::{Durability, Read, ReadResponse, Write, WriteResponse};
use crate::region::{Key, Region};
use crate::store::api::{BackfillChunk, ReadToken, Store, StoreError, WriteToken};
use crate::version::{Version, VersionMap};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Mutex;

// Models the storage engine closely enough for replication to be exercised. Nothing touches disk,
// so `Durability::Hard` and `Durability::Soft` behave the same.
pub struct InMemoryStore {
    owned: Region,
    inner: Mutex<Inner>,
}

struct Inner {
    data: BTreeMap<Key, Bytes>,
    metainfo: VersionMap,
    next_read_token: u64,
    next_write_token: u64,
    outstanding_write_tokens: BTreeSet<u64>,
}

impl InMemoryStore {
    /// A store holding nothing, for `owned`, that vouches for no version.
    pub fn new(owned: Region) -> Self {
        InMemoryStore {
            inner: Mutex::new(Inner {
                data: BTreeMap::new(),
                metainfo: VersionMap::new(owned.clone(), Version::zero()),
                next_read_token: 1,
                next_write_token: 1,
                outstanding_write_tokens: BTreeSet::new(),
            }),
            owned,
        }
    }

    /// Number of documents held. Mostly useful for tests.
    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn get(&self, key: &Key) -> Option<Bytes> {
        self.lock().data.get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("InMemoryStore mutex guard poison")
    }

    fn check_owned(&self, region: &Region) -> Result<(), StoreError> {
        if self.owned.is_superset_of(region) {
            Ok(())
        } else {
            Err(StoreError::RegionNotOwned(region.clone()))
        }
    }
}

impl Inner {
    fn use_write_token(&mut self, token: WriteToken) {
        assert!(
            self.outstanding_write_tokens.remove(&token.0),
            "Write token {:?} was never issued or is used twice",
            token
        );
    }
}

impl Store for InMemoryStore {
    fn new_read_token(&self) -> ReadToken {
        let mut inner = self.lock();
        let token = ReadToken(inner.next_read_token);
        inner.next_read_token += 1;
        token
    }

    fn new_write_token(&self) -> WriteToken {
        let mut inner = self.lock();
        let token = WriteToken(inner.next_write_token);
        inner.next_write_token += 1;
        inner.outstanding_write_tokens.insert(token.0);
        token
    }

    fn get_metainfo(&self, region: &Region) -> Result<VersionMap, StoreError> {
        self.check_owned(region)?;
        Ok(self.lock().metainfo.mask(region))
    }

    fn set_metainfo(&self, token: WriteToken, region: &Region, version: Version) -> Result<(), StoreError> {
        self.check_owned(region)?;
        let mut inner = self.lock();
        inner.use_write_token(token);
        inner.metainfo.update(region, version);
        Ok(())
    }

    fn read(&self, _token: ReadToken, region: &Region, read: &Read) -> Result<ReadResponse, StoreError> {
        self.check_owned(region)?;
        match read {
            Read::Get { key } => {
                if !region.contains_key(key) {
                    return Err(StoreError::KeyOutsideRegion(key.clone(), region.clone()));
                }

                let value = self.lock().data.get(key).cloned();
                Ok(ReadResponse::Get { value })
            }
        }
    }

    fn write(
        &self,
        token: WriteToken,
        region: &Region,
        write: &Write,
        new_version: Version,
        _durability: Durability,
    ) -> Result<WriteResponse, StoreError> {
        self.check_owned(region)?;
        if let Some(key) = write.key() {
            if !region.contains_key(key) {
                return Err(StoreError::KeyOutsideRegion(key.clone(), region.clone()));
            }
        }

        let mut inner = self.lock();
        inner.use_write_token(token);

        let response = match write {
            Write::Put { key, value } => {
                let replaced = inner.data.insert(key.clone(), value.clone()).is_some();
                WriteResponse::Stored { replaced }
            }
            Write::Delete { key } => {
                let existed = inner.data.remove(key).is_some();
                WriteResponse::Deleted { existed }
            }
            Write::Sync => WriteResponse::Synced,
        };
        inner.metainfo.update(region, new_version);

        Ok(response)
    }

    fn backfill_chunk(&self, region: &Region, after: Option<&Key>, limit: usize) -> Result<BackfillChunk, StoreError> {
        self.check_owned(region)?;
        assert!(limit > 0, "Backfill chunk limit must be positive");

        let inner = self.lock();
        let lower = match after {
            Some(after) => Bound::Excluded(after.clone()),
            None => Bound::Included(region.keys.left.clone()),
        };
        let upper = match &region.keys.right {
            Some(right) => Bound::Excluded(right.clone()),
            None => Bound::Unbounded,
        };

        let mut items = Vec::with_capacity(limit);
        let mut done = true;
        for (key, value) in inner.data.range((lower, upper)) {
            if !region.contains_key(key) {
                continue;
            }
            if items.len() == limit {
                done = false;
                break;
            }
            items.push((key.clone(), value.clone()));
        }

        let last_key = items.last().map(|(key, _)| key.clone());
        Ok(BackfillChunk {
            after: after.cloned(),
            items,
            last_key,
            done,
        })
    }

    fn apply_backfill_chunk(&self, token: WriteToken, region: &Region, chunk: &BackfillChunk) -> Result<(), StoreError> {
        self.check_owned(region)?;

        let mut inner = self.lock();
        inner.use_write_token(token);

        let stale: Vec<Key> = inner
            .data
            .keys()
            .filter(|key| region.contains_key(key) && chunk.covers_key(key))
            .cloned()
            .collect();
        for key in stale {
            inner.data.remove(&key);
        }

        for (key, value) in chunk.items.iter() {
            if !region.contains_key(key) {
                return Err(StoreError::KeyOutsideRegion(key.clone(), region.clone()));
            }
            inner.data.insert(key.clone(), value.clone());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{BranchId, Timestamp};

    fn put(store: &InMemoryStore, key: &'static str, value: &'static str, version: Version) -> WriteResponse {
        let token = store.new_write_token();
        store
            .write(
                token,
                &Region::universe(),
                &Write::Put {
                    key: Key::from(key),
                    value: Bytes::from_static(value.as_bytes()),
                },
                version,
                Durability::Hard,
            )
            .unwrap()
    }

    #[test]
    fn write_updates_data_and_metainfo() {
        // -- setup --
        let store = InMemoryStore::new(Region::universe());
        let branch = BranchId::random();
        let version = Version::new(branch, Timestamp::new(1));

        // -- execute --
        let first = put(&store, "k", "v1", version);
        let second = put(&store, "k", "v2", Version::new(branch, Timestamp::new(2)));

        // -- verify --
        assert_eq!(first, WriteResponse::Stored { replaced: false });
        assert_eq!(second, WriteResponse::Stored { replaced: true });
        assert_eq!(store.get(&Key::from("k")), Some(Bytes::from_static(b"v2")));
        let metainfo = store.get_metainfo(&Region::universe()).unwrap();
        assert_eq!(metainfo.single_version(), Some(Version::new(branch, Timestamp::new(2))));
    }

    #[test]
    fn backfill_copies_everything_in_chunks() {
        // -- setup --
        let source = InMemoryStore::new(Region::universe());
        let target = InMemoryStore::new(Region::universe());
        let version = Version::new(BranchId::random(), Timestamp::new(1));
        for key in &["a", "b", "c", "d", "e"] {
            put(&source, key, "v", version);
        }
        put(&target, "zz", "stale", version);

        // -- execute --
        let mut after: Option<Key> = None;
        let mut chunks = 0;
        loop {
            let chunk = source.backfill_chunk(&Region::universe(), after.as_ref(), 2).unwrap();
            target
                .apply_backfill_chunk(target.new_write_token(), &Region::universe(), &chunk)
                .unwrap();
            chunks += 1;
            if chunk.done {
                break;
            }
            after = chunk.last_key.clone();
        }

        // -- verify --
        assert_eq!(chunks, 3);
        assert_eq!(target.len(), 5);
        assert_eq!(target.get(&Key::from("zz")), None);
    }

    #[test]
    #[should_panic(expected = "used twice")]
    fn write_tokens_are_single_use() {
        let store = InMemoryStore::new(Region::universe());
        let token = store.new_write_token();
        store.set_metainfo(token, &Region::universe(), Version::zero()).unwrap();
        store.set_metainfo(token, &Region::universe(), Version::zero()).unwrap();
    }
}
