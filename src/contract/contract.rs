use crate::query::Durability;
use crate::region::Region;
use crate::version::BranchId;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ServerId(Arc<str>);

impl ServerId {
    pub fn new(id: impl AsRef<str>) -> Self {
        ServerId(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ContractId(u64);

impl ContractId {
    pub fn new(id: u64) -> Self {
        ContractId(id)
    }

    pub fn random() -> Self {
        ContractId(rand::random())
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{:x}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrimaryAssignment {
    pub server: ServerId,
    /// Server the primary role is being handed to, if any.
    pub hand_over: Option<ServerId>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AckMode {
    /// One replica besides the primary is enough.
    Single,
    /// A weighted majority of the replicas.
    Majority,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AckConfig {
    pub mode: AckMode,
    /// Missing servers weigh 1.
    pub weights: HashMap<ServerId, u32>,
}

impl AckConfig {
    pub fn single() -> Self {
        AckConfig {
            mode: AckMode::Single,
            weights: HashMap::new(),
        }
    }

    pub fn majority() -> Self {
        AckConfig {
            mode: AckMode::Majority,
            weights: HashMap::new(),
        }
    }

    pub fn weight(&self, server: &ServerId) -> u32 {
        self.weights.get(server).copied().unwrap_or(1)
    }
}

/// Contract is the coordinator's assignment of roles for one region. Contracts are never
/// mutated. A newer contract for the same region replaces the old one.
#[derive(Clone, Debug, PartialEq)]
pub struct Contract {
    pub region: Region,
    pub primary: Option<PrimaryAssignment>,
    pub replicas: BTreeSet<ServerId>,
    /// Second voter set that must also reach quorum while a membership change is in flight.
    pub temp_voters: Option<BTreeSet<ServerId>>,
    /// Branch the primary is expected to write on. Nil until a primary registered one.
    pub branch: BranchId,
    pub ack_config: AckConfig,
    pub durability: Durability,
}

impl Contract {
    pub fn primary_server(&self) -> Option<&ServerId> {
        self.primary.as_ref().map(|p| &p.server)
    }

    pub fn hand_over_target(&self) -> Option<&ServerId> {
        self.primary.as_ref().and_then(|p| p.hand_over.as_ref())
    }

    pub fn is_primary(&self, server: &ServerId) -> bool {
        self.primary_server() == Some(server)
    }

    pub fn is_replica(&self, server: &ServerId) -> bool {
        self.replicas.contains(server)
    }

    pub fn is_voter(&self, server: &ServerId) -> bool {
        self.replicas.contains(server)
            || self
                .temp_voters
                .as_ref()
                .map(|voters| voters.contains(server))
                .unwrap_or(false)
    }
}
