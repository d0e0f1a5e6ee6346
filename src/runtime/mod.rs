mod bus;
mod context;
mod execution;

pub use bus::{EventBus, EventHandler, SubscribeOptions, SubscriptionHandle};
pub use context::Context;
pub use execution::{ExecutionCommand, ExecutionHandle};
