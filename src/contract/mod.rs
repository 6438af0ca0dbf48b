mod ack_counter;
mod contract;
mod contract_ack;

pub use ack_counter::is_safe;
pub use contract::AckConfig;
pub use contract::AckMode;
pub use contract::Contract;
pub use contract::ContractId;
pub use contract::PrimaryAssignment;
pub use contract::ServerId;
pub use contract_ack::create_ack_channel;
pub use contract_ack::ChannelAckSink;
pub use contract_ack::ContractAck;
pub use contract_ack::ContractAckSink;
pub use contract_ack::ContractAckState;
pub use contract_ack::ContractAckStream;
