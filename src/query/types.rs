use crate::region::Key;
use bytes::Bytes;

/// Durability of a write on each replica that applies it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Durability {
    /// Flushed to stable storage before the replica acks.
    Hard,
    /// Acked once applied in memory.
    Soft,
}

/// Write is a blind write. None of the variants read before writing, so applying the same write
/// twice leaves the store in the same state as applying it once.
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Put { key: Key, value: Bytes },
    Delete { key: Key },
    /// No-op write used to confirm that a quorum is reachable.
    Sync,
}

impl Write {
    pub fn key(&self) -> Option<&Key> {
        match self {
            Write::Put { key, .. } => Some(key),
            Write::Delete { key } => Some(key),
            Write::Sync => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WriteResponse {
    Stored { replaced: bool },
    Deleted { existed: bool },
    Synced,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Read {
    Get { key: Key },
}

impl Read {
    pub fn key(&self) -> &Key {
        match self {
            Read::Get { key } => key,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReadResponse {
    Get { value: Option<Bytes> },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadMode {
    /// Served by the freshest readable replica.
    Single,
    /// Like `Single`, followed by a sync write that must reach a quorum.
    Majority,
}
