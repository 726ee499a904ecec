//! Per-agent work.
//!
//! An [`Agent`] owns one connection and runs:
//! - at most one foreground task (cuboid mining or resource collection)
//! - an optional auto-clicker
//! - an optional ring formation around a player
//!
//! Foreground engines borrow a [`TaskContext`] and observe its cancellation
//! token at every suspension point.

mod bot;
pub mod circle;
pub mod clicker;
pub mod collect;
pub mod mining;
pub mod movement;
pub mod reach;
pub mod task;
pub mod tools;

pub use bot::{Agent, AgentStatus};
pub use circle::RingSlot;
pub use collect::CollectionReport;
pub use mining::MiningReport;
pub use task::{PeriodicTask, TaskContext, TaskKind};
