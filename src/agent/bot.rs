//! The per-connection agent record.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::circle::{CircleBehavior, RingSlot};
use crate::agent::clicker::AutoClicker;
use crate::agent::collect::collect_material;
use crate::agent::mining::mine_region;
use crate::agent::task::ForegroundTask;
use crate::agent::{TaskContext, TaskKind};
use crate::config::FleetConfig;
use crate::error::{FleetError, Result};
use crate::geometry::Region;
use crate::world::{BotClient, Goal};

/// Distance kept from a followed player.
const FOLLOW_RANGE: f64 = 1.0;

/// One live connection plus the work attached to it.
///
/// At most one foreground task (mining or collecting) runs at a time. The
/// auto-clicker and circle behaviours are independent of it and of each
/// other.
pub struct Agent {
    id: Uuid,
    name: String,
    client: Arc<dyn BotClient>,
    config: Arc<FleetConfig>,
    connected_at: DateTime<Utc>,
    foreground: Arc<Mutex<Option<ForegroundTask>>>,
    clicker: Mutex<AutoClicker>,
    circle: Mutex<CircleBehavior>,
}

impl Agent {
    pub fn new(client: Arc<dyn BotClient>, config: Arc<FleetConfig>) -> Self {
        let clicker = AutoClicker::new(config.click_interval, config.click_denylist.clone());
        let circle = CircleBehavior::new(config.circle_interval);
        Self {
            id: Uuid::new_v4(),
            name: client.username().to_string(),
            client,
            config,
            connected_at: Utc::now(),
            foreground: Arc::new(Mutex::new(None)),
            clicker: Mutex::new(clicker),
            circle: Mutex::new(circle),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Arc<dyn BotClient> {
        &self.client
    }

    /// Start mining `region` in the background.
    pub async fn start_mining(&self, region: Region) -> Result<()> {
        self.start_foreground(TaskKind::Mining, move |ctx| async move {
            mine_region(&ctx, region).await;
        })
        .await
    }

    /// Start collecting `material` in the background.
    ///
    /// Fails at once if the material does not exist in the agent's version.
    pub async fn start_collecting(&self, material: &str) -> Result<()> {
        let Some(block_type) = self.client.block_type(material) else {
            return Err(FleetError::UnknownMaterial {
                material: material.to_string(),
                version: self.client.version().to_string(),
            });
        };
        self.start_foreground(TaskKind::Collecting, move |ctx| async move {
            collect_material(&ctx, block_type).await;
        })
        .await
    }

    async fn start_foreground<F, Fut>(&self, kind: TaskKind, body: F) -> Result<()>
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = loop {
            let mut slot = self.foreground.lock().await;
            if slot.as_ref().is_some_and(ForegroundTask::is_finished) {
                *slot = None;
            }
            if slot.is_none() {
                break slot;
            }
            if let Some(task) = slot.as_ref().filter(|t| !t.is_stopping()) {
                return Err(FleetError::Busy {
                    name: self.name.clone(),
                    task: task.kind,
                });
            }
            // A stopped task still owns the agent until its loop exits.
            let done = slot.as_ref().map(|t| t.done.clone());
            drop(slot);
            if let Some(done) = done {
                done.cancelled().await;
            }
        };

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let done = CancellationToken::new();
        let ctx = TaskContext::new(Arc::clone(&self.client), Arc::clone(&self.config), token.clone());
        let work = body(ctx);

        let owner = Arc::clone(&self.foreground);
        let finished = done.clone();
        let name = self.name.clone();
        let handle = tokio::spawn(async move {
            work.await;
            {
                let mut slot = owner.lock().await;
                if slot.as_ref().is_some_and(|t| t.id == id) {
                    *slot = None;
                }
            }
            finished.cancel();
            tracing::debug!(agent = %name, "{} task exited", kind);
        });

        tracing::info!(agent = %self.name, task = %kind, "Foreground task started");
        *slot = Some(ForegroundTask {
            id,
            kind,
            token,
            done,
            handle,
        });
        Ok(())
    }

    /// Request the running `kind` task to stop and drop the navigation goal.
    ///
    /// Returns false if no such task was running.
    pub async fn stop_task(&self, kind: TaskKind) -> bool {
        let slot = self.foreground.lock().await;
        let Some(task) = slot.as_ref() else {
            return false;
        };
        if task.kind != kind || task.is_finished() || task.token.is_cancelled() {
            return false;
        }
        task.token.cancel();
        drop(slot);
        self.client.clear_goal().await;
        tracing::info!(agent = %self.name, task = %kind, "Foreground task stopping");
        true
    }

    /// Wait until no foreground task is running.
    pub async fn wait_idle(&self) {
        loop {
            let done = {
                let slot = self.foreground.lock().await;
                match slot.as_ref() {
                    Some(task) if !task.is_finished() => task.done.clone(),
                    _ => return,
                }
            };
            done.cancelled().await;
        }
    }

    /// Kind of the foreground task, if one is running.
    pub async fn active_task(&self) -> Option<TaskKind> {
        let slot = self.foreground.lock().await;
        slot.as_ref()
            .filter(|task| !task.is_finished())
            .map(|task| task.kind)
    }

    pub async fn start_clicker(&self) -> bool {
        self.clicker.lock().await.start(Arc::clone(&self.client))
    }

    pub async fn stop_clicker(&self) -> bool {
        self.clicker.lock().await.stop()
    }

    /// Change the click period, restarting a running clicker.
    pub async fn set_click_interval(&self, interval: Duration) -> bool {
        self.clicker
            .lock()
            .await
            .set_interval(Arc::clone(&self.client), interval)
    }

    pub async fn start_circle(&self, target: &str, radius: f64, slot: RingSlot) -> bool {
        self.circle
            .lock()
            .await
            .start(Arc::clone(&self.client), target, radius, slot)
    }

    /// Player this agent is circling, if any.
    pub async fn circle_target(&self) -> Option<String> {
        self.circle.lock().await.target().map(str::to_string)
    }

    pub async fn set_circle_slot(&self, slot: RingSlot) -> bool {
        self.circle
            .lock()
            .await
            .set_slot(Arc::clone(&self.client), slot)
    }

    pub async fn stop_circle(&self) -> bool {
        self.circle.lock().await.stop(self.client.as_ref()).await
    }

    /// Walk to a column at any height.
    pub async fn go_to_xz(&self, x: i32, z: i32) -> Result<()> {
        self.client.set_goal(Goal::XZ { x, z }).await?;
        Ok(())
    }

    /// Keep following a player until the goal is cleared.
    pub async fn follow(&self, player: &str) -> Result<()> {
        if self.client.player_position(player).await.is_none() {
            return Err(FleetError::PlayerNotFound {
                player: player.to_string(),
                name: self.name.clone(),
            });
        }
        self.client
            .set_goal(Goal::Follow {
                player: player.to_string(),
                range: FOLLOW_RANGE,
            })
            .await?;
        Ok(())
    }

    /// Drop whatever navigation goal is active.
    pub async fn stop_moving(&self) {
        self.client.clear_goal().await;
    }

    pub async fn say(&self, message: &str) -> Result<()> {
        self.client.chat(message).await?;
        Ok(())
    }

    /// Stop every task and behaviour without touching the connection.
    pub async fn halt(&self) {
        if let Some(task) = self.foreground.lock().await.as_ref() {
            task.token.cancel();
        }
        self.stop_clicker().await;
        self.stop_circle().await;
        self.client.clear_goal().await;
    }

    /// Halt everything, then close the connection.
    pub async fn shutdown(&self) {
        self.halt().await;
        self.client.quit().await;
    }

    pub async fn status(&self) -> AgentStatus {
        let (task, stopping) = {
            let slot = self.foreground.lock().await;
            match slot.as_ref().filter(|t| !t.is_finished()) {
                Some(t) => (Some(t.kind), t.is_stopping()),
                None => (None, false),
            }
        };
        AgentStatus {
            name: self.name.clone(),
            task,
            stopping,
            clicker: self.clicker.lock().await.is_running(),
            circling: self.circle_target().await,
            position: self.client.position().await,
            connected_at: self.connected_at,
        }
    }
}

/// Snapshot of an agent for the `list` command.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStatus {
    pub name: String,
    pub task: Option<TaskKind>,
    pub stopping: bool,
    pub clicker: bool,
    pub circling: Option<String>,
    pub position: crate::geometry::Vec3,
    pub connected_at: DateTime<Utc>,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.name, self.position)?;
        match (self.task, self.stopping) {
            (Some(task), true) => write!(f, ", {} (stopping)", task)?,
            (Some(task), false) => write!(f, ", {}", task)?,
            (None, _) => write!(f, ", idle")?,
        }
        if self.clicker {
            write!(f, ", clicking")?;
        }
        if let Some(target) = &self.circling {
            write!(f, ", circling {}", target)?;
        }
        write!(f, " (since {})", self.connected_at.format("%H:%M:%S"))
    }
}
