mod ack_publisher;
mod context;
mod primary;
mod quorum_waiter;
mod secondary;

pub use context::ExecutionContext;
pub use context::ExecutionOptions;
pub use primary::ExecutionError;
pub use primary::PrimaryExecution;
pub use quorum_waiter::WriteError;
pub use secondary::SecondaryExecution;

#[cfg(test)]
pub(crate) use context::test_support;
