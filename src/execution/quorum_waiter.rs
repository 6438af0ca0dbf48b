use crate::contract::{is_safe, Contract, ServerId};
use crate::dispatcher::WriteCallback;
use crate::query::{Durability, WriteResponse};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Write ended before enough replicas acked it")]
    LostContact,
}

pub(crate) type QuorumResult = Result<WriteResponse, WriteError>;

/// QuorumWaiter resolves once the servers that acked a write are safe under its contract, or
/// with `LostContact` once no more acks can come.
pub(crate) struct QuorumWaiter {
    contract: Contract,
    required: Option<ServerId>,
    state: Mutex<WaiterState>,
}

struct WaiterState {
    acked: HashSet<ServerId>,
    response: Option<WriteResponse>,
    result_tx: Option<oneshot::Sender<QuorumResult>>,
    ended: bool,
}

impl QuorumWaiter {
    /// `required`, when set, must be among the acks on top of what `contract` asks for.
    pub fn new(contract: Contract, required: Option<ServerId>) -> (Arc<Self>, oneshot::Receiver<QuorumResult>) {
        let (tx, rx) = oneshot::channel();
        let waiter = QuorumWaiter {
            contract,
            required,
            state: Mutex::new(WaiterState {
                acked: HashSet::new(),
                response: None,
                result_tx: Some(tx),
                ended: false,
            }),
        };

        (Arc::new(waiter), rx)
    }

    fn lock(&self) -> MutexGuard<'_, WaiterState> {
        self.state.lock().expect("QuorumWaiter mutex guard poison")
    }

    fn is_done(&self, state: &WaiterState) -> bool {
        let required_acked = match &self.required {
            Some(server) => state.acked.contains(server),
            None => true,
        };

        required_acked && is_safe(&self.contract, &state.acked)
    }
}

impl WriteCallback for QuorumWaiter {
    fn default_durability(&self) -> Durability {
        self.contract.durability
    }

    fn on_ack(&self, server_id: &ServerId, response: WriteResponse) {
        let mut state = self.lock();
        state.acked.insert(server_id.clone());
        // The primary is always readable, and always needed.
        if self.contract.is_primary(server_id) {
            state.response = Some(response);
        }

        if state.result_tx.is_some() && self.is_done(&state) {
            let response = state.response.clone().unwrap_or(WriteResponse::Synced);
            if let Some(tx) = state.result_tx.take() {
                let _ = tx.send(Ok(response));
            }
        }
    }

    fn on_end(&self) {
        let mut state = self.lock();
        assert!(!state.ended, "QuorumWaiter ended twice");
        state.ended = true;

        if let Some(tx) = state.result_tx.take() {
            let _ = tx.send(Err(WriteError::LostContact));
        }
    }
}
