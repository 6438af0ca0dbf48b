use bytes::Bytes;
use std::fmt;

/// Keys hash into `[0, HASH_SPACE)`. Hash sharding splits this space into ranges.
pub const HASH_SPACE: u64 = 1 << 63;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Key is the primary key of a document.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Key(Bytes);

impl Key {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Key(key.into())
    }

    pub fn min() -> Self {
        Key(Bytes::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// FNV-1a over the key bytes, folded into the hash space.
    pub fn hash_value(&self) -> u64 {
        let mut hash = FNV_OFFSET_BASIS;
        for byte in self.0.iter() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }

        hash % HASH_SPACE
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&'static str> for Key {
    fn from(key: &'static str) -> Self {
        Key(Bytes::from_static(key.as_bytes()))
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key(Bytes::from(key))
    }
}

impl From<Vec<u8>> for Key {
    fn from(key: Vec<u8>) -> Self {
        Key(Bytes::from(key))
    }
}
