use crate::contract::ServerId;
use crate::dispatcher::{Dispatchee, RegistrationId};
use crate::region::{Key, Region};
use crate::store::{BackfillChunk, StoreError};
use crate::version::Timestamp;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Lost contact with primary: {0}")]
    LostContact(String),
    #[error("Registration {0:?} is not live")]
    NotRegistered(RegistrationId),
    #[error("Region {0:?} is not served by this primary")]
    WrongRegion(Region),
    #[error("Interrupted")]
    Interrupted,
    #[error("Primary storage failure")]
    Store(#[from] StoreError),
}

pub struct RegisterInput {
    pub server_id: ServerId,
    /// Receives the primary's writes from now on.
    pub listener: Arc<dyn Dispatchee>,
}

#[derive(Debug)]
pub struct RegisterOutput {
    pub registration_id: RegistrationId,
    /// The listener receives every write after this timestamp.
    pub initial_timestamp: Timestamp,
}

#[derive(Clone, Debug)]
pub struct BackfillChunkInput {
    pub region: Region,
    pub after: Option<Key>,
    /// The chunk must reflect at least every write up to here.
    pub min_timestamp: Timestamp,
    pub limit: usize,
}

/// ReplicatorEndpoint is what a primary offers secondaries: a way to subscribe to its writes and
/// to copy its existing data.
#[async_trait::async_trait]
pub trait ReplicatorEndpoint: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, EndpointError>;

    async fn mark_ready(&self, registration_id: RegistrationId) -> Result<(), EndpointError>;

    async fn deregister(&self, registration_id: RegistrationId) -> Result<(), EndpointError>;

    async fn check_registration(&self, registration_id: RegistrationId) -> Result<(), EndpointError>;

    async fn backfill_chunk(&self, input: BackfillChunkInput) -> Result<BackfillChunk, EndpointError>;
}
