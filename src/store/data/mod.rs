mod event;
mod execution;
mod trigger;
mod workflow;

pub use event::Event;
pub use execution::Execution;
pub use trigger::Trigger;
pub use workflow::Workflow;
