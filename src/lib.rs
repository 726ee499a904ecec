//! Console-driven orchestration of a fleet of autonomous game agents.
//!
//! Each agent runs at most one cancellable foreground task (cuboid mining or
//! resource collection) alongside optional periodic behaviours. The
//! [`fleet::Dispatcher`] routes console commands to agents by name or to
//! all of them at once.

pub mod agent;
pub mod channels;
pub mod cli;
pub mod config;
pub mod error;
pub mod fleet;
pub mod geometry;
pub mod world;
