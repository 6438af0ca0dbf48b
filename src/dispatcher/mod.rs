mod dispatchee;
mod dispatcher;
mod registration;

pub use dispatchee::Dispatchee;
pub use dispatchee::DispatcheeError;
pub use dispatchee::IncompleteWrite;
pub use dispatchee::WriteCallback;
pub use dispatcher::DispatcherOptions;
pub use dispatcher::PrimaryDispatcher;
pub use dispatcher::ReadError;
pub use dispatcher::RegistrationError;
pub use registration::RegistrationHandle;
pub use registration::RegistrationId;
