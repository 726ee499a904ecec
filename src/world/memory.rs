//! In-process world used by the offline sandbox and the test-suite.
//!
//! Blocks default to air, pathfinding is either instantaneous
//! ([`Movement::Teleport`]) or absent ([`Movement::Frozen`]), and every
//! action an agent performs is recorded so callers can inspect it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ActionError;
use crate::geometry::{BlockPos, Region, Vec3};
use crate::world::{
    Block, BlockType, BotClient, BotEvent, ConnectOptions, Connector, Entity, EventStream, Goal,
    Item, is_air,
};

/// Block names every memory world knows about, in id order.
const CATALOG: &[&str] = &[
    "air",
    "stone",
    "cobblestone",
    "dirt",
    "grass_block",
    "sand",
    "gravel",
    "oak_log",
    "oak_planks",
    "oak_leaves",
    "glass",
    "water",
    "coal_ore",
    "iron_ore",
    "diamond_ore",
    "bedrock",
    "obsidian",
];

/// How the simulated pathfinder reacts to goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Movement {
    /// Goals are reached the moment they are set.
    #[default]
    Teleport,
    /// Goals are recorded but the agent never moves.
    Frozen,
}

#[derive(Debug, Default)]
struct BotState {
    position: Vec3,
    goal: Option<Goal>,
    goal_history: Vec<Goal>,
    goals_cleared: u32,
    inventory: Vec<Item>,
    equipped: Option<String>,
    digs: Vec<BlockPos>,
    swings: u32,
    attacks: Vec<String>,
    chat: Vec<String>,
    cursor: Option<Entity>,
    connected: bool,
    events: Option<mpsc::Sender<BotEvent>>,
}

#[derive(Debug)]
struct WorldState {
    version: String,
    blocks: HashMap<BlockPos, String>,
    catalog: Vec<String>,
    unbreakable: HashSet<String>,
    players: HashMap<String, Vec3>,
    bots: HashMap<String, BotState>,
    refused: HashSet<String>,
    movement: Movement,
    spawn: Vec3,
    reach: f64,
}

impl WorldState {
    fn type_id(&mut self, name: &str) -> u32 {
        match self.catalog.iter().position(|n| n == name) {
            Some(id) => id as u32,
            None => {
                self.catalog.push(name.to_string());
                (self.catalog.len() - 1) as u32
            }
        }
    }

    fn block_name(&self, pos: BlockPos) -> &str {
        self.blocks.get(&pos).map(String::as_str).unwrap_or("air")
    }

    fn bot(&mut self, name: &str) -> Option<&mut BotState> {
        self.bots.get_mut(name)
    }
}

/// A shared, mutable in-memory world.
#[derive(Debug, Clone)]
pub struct MemoryWorld {
    state: Arc<Mutex<WorldState>>,
}

impl MemoryWorld {
    /// Create an empty world (all air) speaking `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(WorldState {
                version: version.into(),
                blocks: HashMap::new(),
                catalog: CATALOG.iter().map(|s| s.to_string()).collect(),
                unbreakable: HashSet::from(["bedrock".to_string()]),
                players: HashMap::new(),
                bots: HashMap::new(),
                refused: HashSet::new(),
                movement: Movement::Teleport,
                spawn: Vec3::default(),
                reach: 4.5,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the pathfinder model.
    pub fn with_movement(self, movement: Movement) -> Self {
        self.state().movement = movement;
        self
    }

    /// Set where new connections appear.
    pub fn with_spawn(self, spawn: Vec3) -> Self {
        self.state().spawn = spawn;
        self
    }

    /// Set how far from a block's centre a bot may dig it.
    pub fn with_reach(self, reach: f64) -> Self {
        self.state().reach = reach;
        self
    }

    pub fn set_movement(&self, movement: Movement) {
        self.state().movement = movement;
    }

    pub fn set_block(&self, pos: BlockPos, name: &str) {
        let mut state = self.state();
        state.type_id(name);
        if is_air(name) {
            state.blocks.remove(&pos);
        } else {
            state.blocks.insert(pos, name.to_string());
        }
    }

    /// Fill every cell of a region with one block type.
    pub fn fill(&self, region: Region, name: &str) {
        for pos in region.cells() {
            self.set_block(pos, name);
        }
    }

    pub fn block_name(&self, pos: BlockPos) -> String {
        self.state().block_name(pos).to_string()
    }

    /// Make a block type refuse every dig.
    pub fn set_unbreakable(&self, name: &str) {
        self.state().unbreakable.insert(name.to_string());
    }

    pub fn add_player(&self, name: &str, pos: Vec3) {
        self.state().players.insert(name.to_string(), pos);
    }

    /// Refuse future connections for a username.
    pub fn refuse(&self, username: &str) {
        self.state().refused.insert(username.to_string());
    }

    pub fn bot_position(&self, name: &str) -> Option<Vec3> {
        self.state().bots.get(name).map(|b| b.position)
    }

    pub fn set_bot_position(&self, name: &str, pos: Vec3) {
        if let Some(bot) = self.state().bot(name) {
            bot.position = pos;
        }
    }

    pub fn give(&self, name: &str, item: Item) {
        if let Some(bot) = self.state().bot(name) {
            bot.inventory.push(item);
        }
    }

    pub fn set_cursor(&self, name: &str, entity: Option<Entity>) {
        if let Some(bot) = self.state().bot(name) {
            bot.cursor = entity;
        }
    }

    pub fn equipped(&self, name: &str) -> Option<String> {
        self.state().bots.get(name).and_then(|b| b.equipped.clone())
    }

    /// Every dig attempted by a bot, in order.
    pub fn digs(&self, name: &str) -> Vec<BlockPos> {
        self.state()
            .bots
            .get(name)
            .map(|b| b.digs.clone())
            .unwrap_or_default()
    }

    pub fn goal(&self, name: &str) -> Option<Goal> {
        self.state().bots.get(name).and_then(|b| b.goal.clone())
    }

    pub fn goal_history(&self, name: &str) -> Vec<Goal> {
        self.state()
            .bots
            .get(name)
            .map(|b| b.goal_history.clone())
            .unwrap_or_default()
    }

    pub fn goals_cleared(&self, name: &str) -> u32 {
        self.state().bots.get(name).map_or(0, |b| b.goals_cleared)
    }

    pub fn swings(&self, name: &str) -> u32 {
        self.state().bots.get(name).map_or(0, |b| b.swings)
    }

    /// Names of entities attacked by a bot, in order.
    pub fn attacks(&self, name: &str) -> Vec<String> {
        self.state()
            .bots
            .get(name)
            .map(|b| b.attacks.clone())
            .unwrap_or_default()
    }

    pub fn chat_log(&self, name: &str) -> Vec<String> {
        self.state()
            .bots
            .get(name)
            .map(|b| b.chat.clone())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.state().bots.get(name).is_some_and(|b| b.connected)
    }

    /// Deliver a lifecycle event to a bot's connection.
    pub fn emit(&self, name: &str, event: BotEvent) -> bool {
        let sender = {
            let mut state = self.state();
            let Some(bot) = state.bot(name) else {
                return false;
            };
            if matches!(event, BotEvent::Kicked(_) | BotEvent::End) {
                bot.connected = false;
            }
            bot.events.clone()
        };
        match sender {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Kick a bot from the server.
    pub fn kick(&self, name: &str, reason: &str) -> bool {
        self.emit(name, BotEvent::Kicked(reason.to_string()))
    }

    fn attach(&self, username: &str) -> Result<EventStream, ActionError> {
        let mut state = self.state();
        if state.refused.contains(username) {
            return Err(ActionError::refused(format!(
                "server rejected {}",
                username
            )));
        }
        let (tx, rx) = mpsc::channel(16);
        let spawn = state.spawn;
        state.bots.insert(
            username.to_string(),
            BotState {
                position: spawn,
                connected: true,
                events: Some(tx),
                ..BotState::default()
            },
        );
        Ok(rx)
    }
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self::new("1.20.4")
    }
}

/// A connection into a [`MemoryWorld`].
pub struct MemoryBot {
    world: MemoryWorld,
    username: String,
    version: String,
}

impl MemoryBot {
    fn with_bot<R>(&self, f: impl FnOnce(&mut BotState) -> R) -> Option<R> {
        self.world.state().bot(&self.username).map(f)
    }
}

#[async_trait]
impl BotClient for MemoryBot {
    fn username(&self) -> &str {
        &self.username
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn block_type(&self, name: &str) -> Option<BlockType> {
        let state = self.world.state();
        state
            .catalog
            .iter()
            .position(|n| n == name)
            .map(|id| BlockType {
                id: id as u32,
                name: name.to_string(),
            })
    }

    async fn position(&self) -> Vec3 {
        self.with_bot(|b| b.position).unwrap_or_default()
    }

    async fn block_at(&self, pos: BlockPos) -> Option<Block> {
        let mut state = self.world.state();
        let name = state.block_name(pos).to_string();
        let type_id = state.type_id(&name);
        Some(Block { pos, type_id, name })
    }

    async fn find_blocks(&self, type_id: u32, max_distance: f64, count: usize) -> Vec<BlockPos> {
        let state = self.world.state();
        let Some(name) = state.catalog.get(type_id as usize) else {
            return Vec::new();
        };
        let Some(origin) = state.bots.get(&self.username).map(|b| b.position) else {
            return Vec::new();
        };
        let mut found: Vec<(f64, BlockPos)> = state
            .blocks
            .iter()
            .filter(|(_, n)| *n == name)
            .map(|(pos, _)| (pos.center().distance_to(origin), *pos))
            .filter(|(d, _)| *d <= max_distance)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.into_iter().take(count).map(|(_, pos)| pos).collect()
    }

    async fn inventory(&self) -> Vec<Item> {
        self.with_bot(|b| b.inventory.clone()).unwrap_or_default()
    }

    async fn equip(&self, item: &Item) -> Result<(), ActionError> {
        self.with_bot(|b| {
            if !b.connected {
                return Err(ActionError::Disconnected);
            }
            if b.inventory.iter().any(|i| i.name == item.name) {
                b.equipped = Some(item.name.clone());
                Ok(())
            } else {
                Err(ActionError::unavailable(format!("{} not in inventory", item.name)))
            }
        })
        .unwrap_or(Err(ActionError::Disconnected))
    }

    async fn dig(&self, pos: BlockPos) -> Result<(), ActionError> {
        let mut state = self.world.state();
        let name = state.block_name(pos).to_string();
        let unbreakable = state.unbreakable.contains(&name);
        let reach = state.reach;
        let Some(bot) = state.bot(&self.username) else {
            return Err(ActionError::Disconnected);
        };
        if !bot.connected {
            return Err(ActionError::Disconnected);
        }
        bot.digs.push(pos);

        if is_air(&name) {
            return Err(ActionError::unavailable(format!("no block at {}", pos)));
        }
        if bot.position.distance_to(pos.center()) > reach {
            return Err(ActionError::refused(format!("{} is out of reach", pos)));
        }
        if unbreakable {
            return Err(ActionError::refused(format!("{} cannot be broken", name)));
        }
        if let Some(equipped) = bot.equipped.clone() {
            if let Some(tool) = bot
                .inventory
                .iter_mut()
                .find(|i| i.name == equipped && i.max_durability > 0)
            {
                tool.durability = tool.durability.saturating_sub(1);
            }
        }
        state.blocks.remove(&pos);
        Ok(())
    }

    async fn set_goal(&self, goal: Goal) -> Result<(), ActionError> {
        let mut state = self.world.state();
        let movement = state.movement;
        let player_pos = match &goal {
            Goal::Follow { player, .. } => state.players.get(player).copied(),
            _ => None,
        };
        let Some(bot) = state.bot(&self.username) else {
            return Err(ActionError::Disconnected);
        };
        if !bot.connected {
            return Err(ActionError::Disconnected);
        }
        bot.goal_history.push(goal.clone());
        if movement == Movement::Teleport {
            let destination = match &goal {
                Goal::Block(pos) => Some(pos.center()),
                Goal::Near { pos, .. } => Some(*pos),
                Goal::XZ { x, z } => Some(Vec3::new(
                    *x as f64 + 0.5,
                    bot.position.y,
                    *z as f64 + 0.5,
                )),
                Goal::Follow { .. } => player_pos,
            };
            if let Some(dest) = destination {
                bot.position = dest;
            }
        }
        bot.goal = Some(goal);
        Ok(())
    }

    async fn clear_goal(&self) {
        self.with_bot(|b| {
            b.goal = None;
            b.goals_cleared += 1;
        });
    }

    async fn entity_at_cursor(&self) -> Option<Entity> {
        self.with_bot(|b| b.cursor.clone()).flatten()
    }

    async fn swing_arm(&self) {
        self.with_bot(|b| b.swings += 1);
    }

    async fn attack(&self, entity: &Entity) {
        self.with_bot(|b| b.attacks.push(entity.name.clone()));
    }

    async fn player_position(&self, name: &str) -> Option<Vec3> {
        self.world.state().players.get(name).copied()
    }

    async fn chat(&self, message: &str) -> Result<(), ActionError> {
        self.with_bot(|b| {
            if !b.connected {
                return Err(ActionError::Disconnected);
            }
            b.chat.push(message.to_string());
            Ok(())
        })
        .unwrap_or(Err(ActionError::Disconnected))
    }

    async fn quit(&self) {
        self.world.emit(&self.username, BotEvent::End);
    }
}

/// Opens connections into a [`MemoryWorld`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    world: MemoryWorld,
}

impl MemoryConnector {
    pub fn new(world: MemoryWorld) -> Self {
        Self { world }
    }

    /// Attach a bot directly, bypassing the dispatcher.
    pub fn attach(&self, username: &str) -> Result<(Arc<dyn BotClient>, EventStream), ActionError> {
        let events = self.world.attach(username)?;
        let version = self.world.state().version.clone();
        let client: Arc<dyn BotClient> = Arc::new(MemoryBot {
            world: self.world.clone(),
            username: username.to_string(),
            version,
        });
        Ok((client, events))
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        options: ConnectOptions,
    ) -> Result<(Arc<dyn BotClient>, EventStream), ActionError> {
        tracing::debug!(
            "Memory world accepting {} ({} @ {}:{})",
            options.username,
            options.version,
            options.host,
            options.port
        );
        self.attach(&options.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot(world: &MemoryWorld, name: &str) -> Arc<dyn BotClient> {
        MemoryConnector::new(world.clone()).attach(name).unwrap().0
    }

    #[tokio::test]
    async fn test_blocks_default_to_air() {
        let world = MemoryWorld::default();
        let client = bot(&world, "a");
        let block = client.block_at(BlockPos::new(5, 5, 5)).await.unwrap();
        assert!(block.is_air());
        assert_eq!(block.type_id, 0);
    }

    #[tokio::test]
    async fn test_dig_removes_block_and_records_attempt() {
        let world = MemoryWorld::default();
        let client = bot(&world, "a");
        let pos = BlockPos::new(1, 0, 0);
        world.set_block(pos, "stone");

        client.dig(pos).await.unwrap();
        assert_eq!(world.block_name(pos), "air");
        assert_eq!(world.digs("a"), vec![pos]);

        // Digging air is recorded but fails.
        assert!(client.dig(pos).await.is_err());
        assert_eq!(world.digs("a").len(), 2);
    }

    #[tokio::test]
    async fn test_unbreakable_and_out_of_reach() {
        let world = MemoryWorld::default();
        let client = bot(&world, "a");
        world.set_block(BlockPos::new(0, -1, 0), "bedrock");
        world.set_block(BlockPos::new(20, 0, 0), "stone");

        assert!(matches!(
            client.dig(BlockPos::new(0, -1, 0)).await,
            Err(ActionError::Refused { .. })
        ));
        assert!(matches!(
            client.dig(BlockPos::new(20, 0, 0)).await,
            Err(ActionError::Refused { .. })
        ));
        assert_eq!(world.block_name(BlockPos::new(0, -1, 0)), "bedrock");
    }

    #[tokio::test]
    async fn test_reach_is_configurable() {
        let world = MemoryWorld::default().with_reach(6.0);
        let client = bot(&world, "a");
        let pos = BlockPos::new(5, 0, 0);
        world.set_block(pos, "stone");

        client.dig(pos).await.unwrap();
        assert_eq!(world.block_name(pos), "air");

        let short = MemoryWorld::default();
        let client = bot(&short, "a");
        short.set_block(pos, "stone");
        assert!(matches!(client.dig(pos).await, Err(ActionError::Refused { .. })));
    }

    #[tokio::test]
    async fn test_find_blocks_nearest_first_within_radius() {
        let world = MemoryWorld::default();
        let client = bot(&world, "a");
        world.set_block(BlockPos::new(10, 0, 0), "oak_log");
        world.set_block(BlockPos::new(3, 0, 0), "oak_log");
        world.set_block(BlockPos::new(100, 0, 0), "oak_log");
        world.set_block(BlockPos::new(2, 0, 0), "stone");

        let log = client.block_type("oak_log").unwrap();
        let found = client.find_blocks(log.id, 64.0, 10).await;
        assert_eq!(found, vec![BlockPos::new(3, 0, 0), BlockPos::new(10, 0, 0)]);
    }

    #[tokio::test]
    async fn test_teleport_and_frozen_movement() {
        let world = MemoryWorld::default();
        let client = bot(&world, "a");
        client.set_goal(Goal::XZ { x: 10, z: -3 }).await.unwrap();
        assert_eq!(world.bot_position("a"), Some(Vec3::new(10.5, 0.0, -2.5)));

        world.set_movement(Movement::Frozen);
        client
            .set_goal(Goal::Block(BlockPos::new(50, 0, 50)))
            .await
            .unwrap();
        assert_eq!(world.bot_position("a"), Some(Vec3::new(10.5, 0.0, -2.5)));
        assert_eq!(world.goal_history("a").len(), 2);

        client.clear_goal().await;
        assert_eq!(world.goal("a"), None);
    }

    #[tokio::test]
    async fn test_kick_delivers_event() {
        let world = MemoryWorld::default();
        let (_client, mut events) = MemoryConnector::new(world.clone()).attach("a").unwrap();
        assert!(world.kick("a", "flying"));
        assert_eq!(events.recv().await, Some(BotEvent::Kicked("flying".into())));
        assert!(!world.is_connected("a"));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let world = MemoryWorld::default();
        world.refuse("banned");
        assert!(MemoryConnector::new(world).attach("banned").is_err());
    }
}
