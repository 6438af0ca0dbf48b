use crate::contract::contract::ContractId;
use crate::version::{BranchHistory, BranchId, VersionMap};
use tokio::sync::mpsc;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ContractAckState {
    PrimaryNeedBranch,
    PrimaryInProgress,
    PrimaryReady,
    SecondaryNeedPrimary,
    SecondaryBackfilling,
    SecondaryStreaming,
}

/// ContractAck is an executor's report on how far it got with a contract. Only the latest ack for
/// a contract means anything.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractAck {
    pub state: ContractAckState,
    pub branch: Option<BranchId>,
    pub branch_history: BranchHistory,
    pub version: Option<VersionMap>,
    pub failover_timeout_elapsed: bool,
}

impl ContractAck {
    pub fn new(state: ContractAckState) -> Self {
        ContractAck {
            state,
            branch: None,
            branch_history: BranchHistory::new(),
            version: None,
            failover_timeout_elapsed: false,
        }
    }

    pub fn with_branch(mut self, branch: BranchId, branch_history: BranchHistory) -> Self {
        self.branch = Some(branch);
        self.branch_history = branch_history;
        self
    }

    pub fn with_version(mut self, version: VersionMap) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_failover_timeout_elapsed(mut self, elapsed: bool) -> Self {
        self.failover_timeout_elapsed = elapsed;
        self
    }
}

/// ContractAckSink delivers acks to whoever issues contracts. Fire-and-forget: delivering the same
/// ack twice is harmless.
pub trait ContractAckSink: Send + Sync {
    fn send_ack(&self, contract_id: ContractId, ack: ContractAck);
}

pub fn create_ack_channel() -> (ChannelAckSink, ContractAckStream) {
    let (tx, rx) = mpsc::unbounded_channel();

    (ChannelAckSink { sender: tx }, ContractAckStream { receiver: rx })
}

pub struct ChannelAckSink {
    sender: mpsc::UnboundedSender<(ContractId, ContractAck)>,
}

impl ContractAckSink for ChannelAckSink {
    fn send_ack(&self, contract_id: ContractId, ack: ContractAck) {
        // Receiver gone means nobody is coordinating anymore.
        let _ = self.sender.send((contract_id, ack));
    }
}

pub struct ContractAckStream {
    receiver: mpsc::UnboundedReceiver<(ContractId, ContractAck)>,
}

impl ContractAckStream {
    pub async fn next(&mut self) -> Option<(ContractId, ContractAck)> {
        self.receiver.recv().await
    }

    pub fn try_next(&mut self) -> Option<(ContractId, ContractAck)> {
        self.receiver.try_recv().ok()
    }
}
