mod reactor;

pub use reactor::Blueprint;
pub use reactor::Reactor;
pub use reactor::Role;
pub use reactor::RoutingError;
