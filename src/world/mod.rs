//! Seams to the external game client.
//!
//! The protocol connection, world model and pathfinder live outside this
//! crate. Everything the fleet needs from them is expressed by the
//! [`BotClient`] and [`Connector`] traits; [`memory`] provides an in-process
//! implementation used for the offline sandbox and the tests.

mod blocks;
pub mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ActionError;
use crate::geometry::{BlockPos, Vec3};

pub use blocks::{MaterialClass, is_air, is_transparent};

/// Identity of a block type in the client's world version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockType {
    pub id: u32,
    pub name: String,
}

/// A block resolved at a coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub pos: BlockPos,
    pub type_id: u32,
    pub name: String,
}

impl Block {
    pub fn is_air(&self) -> bool {
        is_air(&self.name)
    }
}

/// An inventory stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub count: u32,
    /// Durability when new; zero for items that do not wear.
    pub max_durability: u32,
    /// Durability left.
    pub durability: u32,
}

impl Item {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
            max_durability: 0,
            durability: 0,
        }
    }

    /// A tool with `remaining` of `max` durability left.
    pub fn tool(name: impl Into<String>, max: u32, remaining: u32) -> Self {
        Self {
            name: name.into(),
            count: 1,
            max_durability: max,
            durability: remaining.min(max),
        }
    }

    /// Durability already consumed.
    pub fn wear(&self) -> u32 {
        self.max_durability.saturating_sub(self.durability)
    }
}

/// An entity the agent can see.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
}

/// A navigation target handed to the pathfinder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Goal {
    /// Stand in or next to a specific block.
    Block(BlockPos),
    /// Get within `range` of a point.
    Near { pos: Vec3, range: f64 },
    /// Reach a column at any height.
    XZ { x: i32, z: i32 },
    /// Keep within `range` of a moving player.
    Follow { player: String, range: f64 },
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Block(pos) => write!(f, "block {}", pos),
            Goal::Near { pos, range } => write!(f, "near {} (±{})", pos, range),
            Goal::XZ { x, z } => write!(f, "column ({}, {})", x, z),
            Goal::Follow { player, range } => write!(f, "follow {} (±{})", player, range),
        }
    }
}

/// Lifecycle notifications from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// The server removed the agent.
    Kicked(String),
    /// A protocol error; the connection may survive it.
    Error(String),
    /// The connection closed.
    End,
}

/// Parameters for opening one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub version: String,
    pub username: String,
    pub host: String,
    pub port: u16,
    pub keep_alive: bool,
    pub keep_alive_interval: Duration,
}

/// A live connection to the game, owned by the external protocol client.
#[async_trait]
pub trait BotClient: Send + Sync {
    /// In-game name of this connection.
    fn username(&self) -> &str;

    /// Protocol/world version the connection speaks.
    fn version(&self) -> &str;

    /// Look up a block type by name for this version.
    fn block_type(&self, name: &str) -> Option<BlockType>;

    /// Current position of the agent.
    async fn position(&self) -> Vec3;

    /// Resolve the block at a coordinate. `None` if the chunk is not loaded.
    async fn block_at(&self, pos: BlockPos) -> Option<Block>;

    /// Up to `count` blocks of a type within `max_distance`, nearest first.
    async fn find_blocks(&self, type_id: u32, max_distance: f64, count: usize) -> Vec<BlockPos>;

    /// Snapshot of the inventory.
    async fn inventory(&self) -> Vec<Item>;

    /// Move an inventory item to the main hand.
    async fn equip(&self, item: &Item) -> Result<(), ActionError>;

    /// Break the block at a coordinate.
    async fn dig(&self, pos: BlockPos) -> Result<(), ActionError>;

    /// Replace the current navigation goal.
    async fn set_goal(&self, goal: Goal) -> Result<(), ActionError>;

    /// Drop the current navigation goal, if any.
    async fn clear_goal(&self);

    /// The entity under the agent's crosshair.
    async fn entity_at_cursor(&self) -> Option<Entity>;

    /// Swing the main hand at nothing.
    async fn swing_arm(&self);

    /// Attack an entity.
    async fn attack(&self, entity: &Entity);

    /// Position of a named player, if visible.
    async fn player_position(&self, name: &str) -> Option<Vec3>;

    /// Send a chat message.
    async fn chat(&self, message: &str) -> Result<(), ActionError>;

    /// Close the connection.
    async fn quit(&self);
}

/// Receiver side of a connection's lifecycle events.
pub type EventStream = mpsc::Receiver<BotEvent>;

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        options: ConnectOptions,
    ) -> Result<(Arc<dyn BotClient>, EventStream), ActionError>;
}
