use crate::contract::{ContractAck, ContractAckSink, ContractId};
use std::sync::{Arc, Mutex, MutexGuard};

/// AckPublisher only lets acks for the execution's current contract through. Once
/// `set_contract` returns, nothing is acked for the previous contract anymore.
pub(crate) struct AckPublisher {
    sink: Arc<dyn ContractAckSink>,
    state: Mutex<AckState>,
}

struct AckState {
    contract_id: ContractId,
    last: Option<ContractAck>,
}

impl AckPublisher {
    pub fn new(sink: Arc<dyn ContractAckSink>, contract_id: ContractId) -> Self {
        AckPublisher {
            sink,
            state: Mutex::new(AckState {
                contract_id,
                last: None,
            }),
        }
    }

    pub fn set_contract(&self, contract_id: ContractId) {
        self.lock().contract_id = contract_id;
    }

    /// Sends `ack` if `contract_id` is still current. Returns false if it was superseded.
    pub fn send(&self, contract_id: ContractId, ack: ContractAck) -> bool {
        // The lock is held while sending so a concurrent `set_contract` can't slip in between
        // the check and the send.
        let mut state = self.lock();
        if state.contract_id != contract_id {
            return false;
        }

        state.last = Some(ack.clone());
        self.sink.send_ack(contract_id, ack);
        true
    }

    pub fn send_current(&self, ack: ContractAck) {
        let mut state = self.lock();
        state.last = Some(ack.clone());
        self.sink.send_ack(state.contract_id, ack);
    }

    /// Repeats the last ack under the current contract.
    pub fn resend(&self) {
        let state = self.lock();
        if let Some(ack) = &state.last {
            self.sink.send_ack(state.contract_id, ack.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, AckState> {
        self.state.lock().expect("AckPublisher mutex guard poison")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{create_ack_channel, ContractAckState};

    #[test]
    fn superseded_contracts_are_not_acked() {
        // -- setup --
        let (sink, mut stream) = create_ack_channel();
        let publisher = AckPublisher::new(Arc::new(sink), ContractId::new(1));

        // -- execute --
        assert!(publisher.send(ContractId::new(1), ContractAck::new(ContractAckState::PrimaryInProgress)));
        publisher.set_contract(ContractId::new(2));
        let stale = publisher.send(ContractId::new(1), ContractAck::new(ContractAckState::PrimaryReady));
        publisher.resend();

        // -- verify --
        assert!(!stale);
        let (id, ack) = stream.try_next().unwrap();
        assert_eq!(id, ContractId::new(1));
        assert_eq!(ack.state, ContractAckState::PrimaryInProgress);
        let (id, ack) = stream.try_next().unwrap();
        assert_eq!(id, ContractId::new(2));
        assert_eq!(ack.state, ContractAckState::PrimaryInProgress);
        assert!(stream.try_next().is_none());
    }
}
