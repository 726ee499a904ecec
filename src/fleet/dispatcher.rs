//! Routes console commands to agents and owns their lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;

use crate::agent::{Agent, RingSlot, TaskKind};
use crate::config::FleetConfig;
use crate::error::{FleetError, Result};
use crate::fleet::command::{ClickerAction, Command, HELP};
use crate::fleet::{AgentRegistry, Selector};
use crate::world::{BotEvent, ConnectOptions, Connector, EventStream};

/// Executes commands against the fleet.
///
/// Every command returns the lines to show on the console. Nothing here
/// fails the caller: errors become replies.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    connector: Arc<dyn Connector>,
    config: Arc<FleetConfig>,
}

impl Dispatcher {
    pub fn new(connector: Arc<dyn Connector>, config: Arc<FleetConfig>) -> Self {
        Self {
            registry: Arc::new(AgentRegistry::new()),
            connector,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Parse and execute one console line.
    pub async fn handle_line(&self, line: &str) -> Vec<String> {
        self.run_line(line, false).await
    }

    /// Like [`handle_line`](Self::handle_line), but `start` returns only
    /// once every requested agent has connected or failed.
    pub async fn handle_line_settled(&self, line: &str) -> Vec<String> {
        self.run_line(line, true).await
    }

    async fn run_line(&self, line: &str, settle: bool) -> Vec<String> {
        match Command::parse(line) {
            Ok(Some(command)) => self.dispatch(command, settle).await,
            Ok(None) => Vec::new(),
            Err(e) => vec![e.to_string()],
        }
    }

    pub async fn execute(&self, command: Command) -> Vec<String> {
        self.dispatch(command, false).await
    }

    async fn dispatch(&self, command: Command, settle: bool) -> Vec<String> {
        tracing::debug!("Executing {:?}", command);
        match command {
            Command::Start {
                version,
                username,
                host,
                port,
                count,
                delay,
            } => {
                if count == 0 {
                    return vec!["Nothing to start.".to_string()];
                }
                let template = ConnectOptions {
                    version,
                    username: username.clone(),
                    host,
                    port,
                    keep_alive: true,
                    keep_alive_interval: self.config.keep_alive_interval,
                };
                let handles = self.start(template, count, delay);
                if settle {
                    for result in join_all(handles).await {
                        if let Err(e) = result {
                            tracing::error!("Spawn task failed: {}", e);
                        }
                    }
                }
                vec![format!(
                    "Starting {} agent(s): {}0..{}{}",
                    count,
                    username,
                    username,
                    count - 1
                )]
            }
            Command::Stop(selector) => self.stop(&selector).await,
            Command::Goto { selector, x, z } => {
                self.for_each(&selector, |agent| async move {
                    match agent.go_to_xz(x, z).await {
                        Ok(()) => format!("{} is moving to {}, {}", agent.name(), x, z),
                        Err(e) => e.to_string(),
                    }
                })
                .await
            }
            Command::GotoStop(selector) | Command::FollowStop(selector) => {
                self.for_each(&selector, |agent| async move {
                    agent.stop_moving().await;
                    format!("{} has stopped", agent.name())
                })
                .await
            }
            Command::Follow { selector, player } => {
                self.for_each(&selector, |agent| {
                    let player = player.clone();
                    async move {
                        match agent.follow(&player).await {
                            Ok(()) => format!("{} is following {}", agent.name(), player),
                            Err(e) => e.to_string(),
                        }
                    }
                })
                .await
            }
            Command::Mine { selector, region } => {
                self.for_each(&selector, |agent| async move {
                    match agent.start_mining(region).await {
                        Ok(()) => format!("{} started mining {}", agent.name(), region),
                        Err(e) => e.to_string(),
                    }
                })
                .await
            }
            Command::MineStop(selector) => self.stop_task(&selector, TaskKind::Mining).await,
            Command::Find { selector, material } => {
                self.for_each(&selector, |agent| {
                    let material = material.clone();
                    async move {
                        match agent.start_collecting(&material).await {
                            Ok(()) => format!("{} is collecting {}", agent.name(), material),
                            Err(e) => e.to_string(),
                        }
                    }
                })
                .await
            }
            Command::FindStop(selector) => self.stop_task(&selector, TaskKind::Collecting).await,
            Command::Clicker { action, selector } => self.clicker(&selector, action).await,
            Command::Circle {
                selector,
                player,
                radius,
            } => self.circle(&selector, &player, radius).await,
            Command::CircleStop(selector) => self.circle_stop(&selector).await,
            Command::Send { selector, message } => {
                self.for_each(&selector, |agent| {
                    let message = message.clone();
                    async move {
                        match agent.say(&message).await {
                            Ok(()) => format!("{} said: {}", agent.name(), message),
                            Err(e) => format!("{} could not send: {}", agent.name(), e),
                        }
                    }
                })
                .await
            }
            Command::List => self.list().await,
            Command::Help => HELP.lines().map(str::to_string).collect(),
        }
    }

    /// Resolve a selector, or explain why nothing matched.
    async fn targets(&self, selector: &Selector) -> std::result::Result<Vec<Arc<Agent>>, String> {
        let agents = self.registry.select(selector).await;
        if !agents.is_empty() {
            return Ok(agents);
        }
        Err(match selector {
            Selector::Named(name) => FleetError::AgentNotFound { name: name.clone() }.to_string(),
            Selector::All => "No agents connected.".to_string(),
        })
    }

    /// Run `action` on every selected agent in name order.
    async fn for_each<F, Fut>(&self, selector: &Selector, mut action: F) -> Vec<String>
    where
        F: FnMut(Arc<Agent>) -> Fut,
        Fut: std::future::Future<Output = String>,
    {
        let agents = match self.targets(selector).await {
            Ok(agents) => agents,
            Err(reply) => return vec![reply],
        };
        let mut replies = Vec::with_capacity(agents.len());
        for agent in agents {
            replies.push(action(agent).await);
        }
        replies
    }

    async fn stop(&self, selector: &Selector) -> Vec<String> {
        let agents = match selector {
            Selector::All => self.registry.drain().await,
            Selector::Named(name) => match self.registry.remove(name).await {
                Some(agent) => vec![agent],
                None => return vec![FleetError::AgentNotFound { name: name.clone() }.to_string()],
            },
        };
        if agents.is_empty() {
            return vec!["No agents connected.".to_string()];
        }

        let mut replies = Vec::with_capacity(agents.len());
        for agent in agents {
            agent.shutdown().await;
            tracing::info!(agent = %agent.name(), "Agent stopped");
            replies.push(format!("{} stopped.", agent.name()));
        }
        replies
    }

    async fn stop_task(&self, selector: &Selector, kind: TaskKind) -> Vec<String> {
        let label = match kind {
            TaskKind::Mining => "mining",
            TaskKind::Collecting => "collecting",
        };
        self.for_each(selector, |agent| async move {
            if agent.stop_task(kind).await {
                format!("{} {} stopped.", agent.name(), label)
            } else {
                format!("{} is not {}.", agent.name(), label)
            }
        })
        .await
    }

    async fn clicker(&self, selector: &Selector, action: ClickerAction) -> Vec<String> {
        self.for_each(selector, |agent| {
            let action = action.clone();
            async move {
                let name = agent.name();
                match action {
                    ClickerAction::Start if agent.start_clicker().await => {
                        format!("{} auto-clicker started.", name)
                    }
                    ClickerAction::Start => format!("{} auto-clicker already running.", name),
                    ClickerAction::Stop if agent.stop_clicker().await => {
                        format!("{} auto-clicker stopped.", name)
                    }
                    ClickerAction::Stop => format!("{} auto-clicker is not running.", name),
                    ClickerAction::Speed(interval) => {
                        agent.set_click_interval(interval).await;
                        format!(
                            "{} auto-clicker speed set to {}ms.",
                            name,
                            interval.as_millis()
                        )
                    }
                }
            }
        })
        .await
    }

    /// Put the selected agents on the ring around `player`.
    ///
    /// Slots are shared by every agent circling `player`, not only the ones
    /// selected here, so later joiners spread the whole ring out again.
    async fn circle(&self, selector: &Selector, player: &str, radius: f64) -> Vec<String> {
        let agents = match self.targets(selector).await {
            Ok(agents) => agents,
            Err(reply) => return vec![reply],
        };

        let mut replies = BTreeMap::new();
        for agent in agents {
            let name = agent.name().to_string();
            let reply = if agent.client().player_position(player).await.is_none() {
                FleetError::PlayerNotFound {
                    player: player.to_string(),
                    name: name.clone(),
                }
                .to_string()
            } else if agent.start_circle(player, radius, RingSlot::new(0, 1)).await {
                format!("{} is circling around {}", name, player)
            } else {
                format!("{} is already circling.", name)
            };
            replies.insert(name, reply);
        }
        self.rebalance_ring(player).await;
        replies.into_values().collect()
    }

    async fn circle_stop(&self, selector: &Selector) -> Vec<String> {
        let agents = match self.targets(selector).await {
            Ok(agents) => agents,
            Err(reply) => return vec![reply],
        };

        let mut replies = Vec::with_capacity(agents.len());
        let mut players = Vec::new();
        for agent in agents {
            let target = agent.circle_target().await;
            if agent.stop_circle().await {
                replies.push(format!("{} has stopped circling.", agent.name()));
                players.extend(target);
            } else {
                replies.push(format!("{} is not circling.", agent.name()));
            }
        }
        players.sort();
        players.dedup();
        for player in players {
            self.rebalance_ring(&player).await;
        }
        replies
    }

    /// Give every agent circling `player` an even slot, in name order.
    async fn rebalance_ring(&self, player: &str) {
        let mut ring = Vec::new();
        for agent in self.registry.select(&Selector::All).await {
            if agent.circle_target().await.as_deref() == Some(player) {
                ring.push(agent);
            }
        }
        let total = ring.len();
        for (index, agent) in ring.into_iter().enumerate() {
            agent.set_circle_slot(RingSlot::new(index, total)).await;
        }
    }

    async fn list(&self) -> Vec<String> {
        let agents = self.registry.select(&Selector::All).await;
        if agents.is_empty() {
            return vec!["No agents connected.".to_string()];
        }
        let mut lines = Vec::with_capacity(agents.len());
        for agent in agents {
            lines.push(agent.status().await.to_string());
        }
        lines
    }

    /// Spawn `count` agents named `<username><i>`, the i-th after `i * delay`.
    pub fn start(&self, template: ConnectOptions, count: u32, delay: Duration) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|i| {
                let dispatcher = self.clone();
                let options = ConnectOptions {
                    username: format!("{}{}", template.username, i),
                    ..template.clone()
                };
                tokio::spawn(async move {
                    tokio::time::sleep(delay.saturating_mul(i)).await;
                    if let Err(e) = dispatcher.spawn_agent(options).await {
                        tracing::error!("{}", e);
                    }
                })
            })
            .collect()
    }

    /// Connect one agent, register it, and watch its connection.
    pub async fn spawn_agent(&self, options: ConnectOptions) -> Result<Arc<Agent>> {
        let name = options.username.clone();
        tracing::info!(agent = %name, "Connecting to {}:{} ({})", options.host, options.port, options.version);

        let timeout = self.config.connect_timeout;
        let (client, events) = match tokio::time::timeout(timeout, self.connector.connect(options)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                return Err(FleetError::ConnectFailed {
                    name,
                    reason: e.to_string(),
                });
            }
            Err(_) => return Err(FleetError::ConnectTimeout { name, timeout }),
        };

        let agent = Arc::new(Agent::new(client, Arc::clone(&self.config)));
        if let Some(previous) = self.registry.insert(Arc::clone(&agent)).await {
            tracing::warn!(agent = %name, "Replacing an agent with the same name");
            previous.halt().await;
        }
        self.watch(Arc::clone(&agent), events);
        tracing::info!(agent = %name, "Agent connected");
        Ok(agent)
    }

    /// Deregister the agent once its connection ends.
    fn watch(&self, agent: Arc<Agent>, mut events: EventStream) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let name = agent.name().to_string();
            loop {
                match events.recv().await {
                    Some(BotEvent::Error(message)) => {
                        tracing::error!(agent = %name, "Error for {}: {}", name, message);
                    }
                    Some(BotEvent::Kicked(reason)) => {
                        tracing::warn!(agent = %name, "kicked: {}: {}", name, reason);
                        break;
                    }
                    Some(BotEvent::End) | None => {
                        tracing::info!(agent = %name, "{} has disconnected.", name);
                        break;
                    }
                }
            }
            agent.halt().await;
            registry.remove_if_current(&name, agent.id()).await;
        })
    }

    /// Stop and disconnect every agent.
    pub async fn shutdown_all(&self) {
        for agent in self.registry.drain().await {
            agent.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::geometry::Vec3;
    use crate::world::Goal;
    use crate::world::memory::{MemoryConnector, MemoryWorld, Movement};

    fn dispatcher(world: &MemoryWorld) -> Dispatcher {
        Dispatcher::new(
            Arc::new(MemoryConnector::new(world.clone())),
            Arc::new(FleetConfig::default()),
        )
    }

    async fn started(world: &MemoryWorld, count: u32) -> Dispatcher {
        let dispatcher = dispatcher(world);
        dispatcher
            .handle_line(&format!("start 1.20.4 bot localhost 25565 {} 0", count))
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        dispatcher
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_staggers_spawns() {
        let world = MemoryWorld::default();
        let dispatcher = dispatcher(&world);

        let replies = dispatcher
            .handle_line("start 1.20.4 bot localhost 25565 3 1000")
            .await;
        assert_eq!(replies, vec!["Starting 3 agent(s): bot0..bot2"]);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(dispatcher.registry().names().await, vec!["bot0"]);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(dispatcher.registry().names().await, vec!["bot0", "bot1"]);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(dispatcher.registry().len().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_is_not_registered() {
        let world = MemoryWorld::default();
        world.refuse("bot1");
        let dispatcher = started(&world, 3).await;

        assert_eq!(dispatcher.registry().names().await, vec!["bot0", "bot2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_named_selector_not_found() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 1).await;

        assert_eq!(
            dispatcher.handle_line("goto ghost 1 2").await,
            vec!["Bot ghost not found."]
        );
        assert_eq!(world.goal("bot0"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_numbers_change_nothing() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 1).await;

        let replies = dispatcher.handle_line("goto bot0 ten 2").await;
        assert_eq!(replies, vec!["Invalid x 'ten': expected a number"]);
        assert!(world.goal_history("bot0").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_deregisters_and_halts() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 2).await;
        dispatcher.handle_line("clicker start bot0").await;

        world.kick("bot0", "flying is not enabled");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(dispatcher.registry().names().await, vec!["bot1"]);
        let swings = world.swings("bot0");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(world.swings("bot0"), swings);
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_error_keeps_agent() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 1).await;

        world.emit("bot0", BotEvent::Error("bad packet".into()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(dispatcher.registry().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_quits_everyone() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 2).await;

        let replies = dispatcher.handle_line("stop *").await;
        assert_eq!(replies, vec!["bot0 stopped.", "bot1 stopped."]);
        assert!(dispatcher.registry().is_empty().await);
        assert!(!world.is_connected("bot0"));
        assert!(!world.is_connected("bot1"));

        assert_eq!(dispatcher.handle_line("stop bot0").await, vec!["Bot bot0 not found."]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_unknown_material_reports_version() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 1).await;

        assert_eq!(
            dispatcher.handle_line("find bot0 unobtainium").await,
            vec!["Block unobtainium not found in version 1.20.4"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_agent_rejects_second_task() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 1).await;

        assert_eq!(
            dispatcher.handle_line("find bot0 dirt").await,
            vec!["bot0 is collecting dirt"]
        );
        assert_eq!(
            dispatcher.handle_line("mine bot0 0 0 0 1 1 1").await,
            vec!["bot0 is busy (collecting)"]
        );
        assert_eq!(
            dispatcher.handle_line("find stop bot0").await,
            vec!["bot0 collecting stopped."]
        );
        assert_eq!(
            dispatcher.handle_line("find stop bot0").await,
            vec!["bot0 is not collecting."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_and_help() {
        let world = MemoryWorld::default();
        let dispatcher = dispatcher(&world);
        assert_eq!(dispatcher.handle_line("list").await, vec!["No agents connected."]);
        assert!(dispatcher.handle_line("help").await.len() > 5);

        let dispatcher = started(&world, 1).await;
        dispatcher.handle_line("clicker start *").await;
        let lines = dispatcher.handle_line("list").await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bot0 at (0.0, 0.0, 0.0), idle, clicking"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_click_speed_keeps_clicker_running() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 1).await;
        dispatcher.handle_line("clicker start bot0").await;

        assert_eq!(
            dispatcher.handle_line("clicker speed bot0 0").await,
            vec!["Invalid interval '0': must be at least 1ms"]
        );
        tokio::time::sleep(Duration::from_millis(3100)).await;

        assert_eq!(world.swings("bot0"), 3);
        assert!(dispatcher.handle_line("list").await[0].contains("clicking"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_stagger_delay_saturates() {
        let world = MemoryWorld::default();
        let dispatcher = dispatcher(&world);
        let template = ConnectOptions {
            version: "1.20.4".into(),
            username: "bot".into(),
            host: "localhost".into(),
            port: 25565,
            keep_alive: true,
            keep_alive_interval: Duration::from_secs(10),
        };

        let handles = dispatcher.start(template, 3, Duration::from_millis(u64::MAX));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(dispatcher.registry().names().await, vec!["bot0"]);
        assert!(handles[0].is_finished());
        assert!(!handles[1].is_finished());
        assert!(!handles[2].is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_oversized_count() {
        let world = MemoryWorld::default();
        let dispatcher = dispatcher(&world);

        let replies = dispatcher
            .handle_line("start 1.20.4 b h 25565 5000 0")
            .await;
        assert_eq!(replies, vec!["Invalid count '5000': must be at most 1000"]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(dispatcher.registry().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_reaches_every_registered_agent() {
        let world = MemoryWorld::default();
        let dispatcher = started(&world, 3).await;
        dispatcher.handle_line("stop bot1").await;

        let replies = dispatcher.handle_line("send * hello there").await;

        assert_eq!(
            replies,
            vec!["bot0 said: hello there", "bot2 said: hello there"]
        );
        assert_eq!(world.chat_log("bot0"), vec!["hello there"]);
        assert_eq!(world.chat_log("bot2"), vec!["hello there"]);
        assert!(world.chat_log("bot1").is_empty());

        assert_eq!(
            dispatcher.handle_line("send bot1 anyone?").await,
            vec!["Bot bot1 not found."]
        );
        assert!(world.chat_log("bot1").is_empty());
    }

    fn ring_angle(world: &MemoryWorld, name: &str, center: Vec3) -> i64 {
        let Some(Goal::Near { pos, .. }) = world.goal(name) else {
            panic!("{} has no ring goal", name);
        };
        (pos.z - center.z)
            .atan2(pos.x - center.x)
            .to_degrees()
            .rem_euclid(360.0)
            .round() as i64
            % 360
    }

    #[tokio::test(start_paused = true)]
    async fn test_ring_slots_are_shared_per_target() {
        let world = MemoryWorld::default().with_movement(Movement::Frozen);
        let center = Vec3::new(0.0, 64.0, 0.0);
        world.add_player("steve", center);
        let dispatcher = started(&world, 3).await;

        assert_eq!(
            dispatcher.handle_line("circle bot0 steve 6").await,
            vec!["bot0 is circling around steve"]
        );
        dispatcher.handle_line("circle bot1 steve 6").await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(ring_angle(&world, "bot0", center), 0);
        assert_eq!(ring_angle(&world, "bot1", center), 180);

        dispatcher.handle_line("circle bot2 steve 6").await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(ring_angle(&world, "bot2", center), 240);
        assert_eq!(ring_angle(&world, "bot1", center), 120);

        assert_eq!(
            dispatcher.handle_line("circle stop bot1").await,
            vec!["bot1 has stopped circling."]
        );
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(ring_angle(&world, "bot0", center), 0);
        assert_eq!(ring_angle(&world, "bot2", center), 180);
        assert_eq!(world.goal("bot1"), None);
    }
}
