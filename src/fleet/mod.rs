//! The fleet: registry, console commands and dispatch.

pub mod command;
mod dispatcher;
mod registry;

pub use command::{ClickerAction, Command};
pub use dispatcher::Dispatcher;
pub use registry::{AgentRegistry, Selector};
