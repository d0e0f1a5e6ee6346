mod event;
mod execution;
mod trigger;
mod workflow;
