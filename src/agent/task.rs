//! Task plumbing shared by the engines and behaviours.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::FleetConfig;
use crate::geometry::BlockPos;
use crate::world::BotClient;

/// The two mutually exclusive foreground tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Mining,
    Collecting,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mining => write!(f, "mining"),
            Self::Collecting => write!(f, "collecting"),
        }
    }
}

/// Everything a running engine may touch.
#[derive(Clone)]
pub struct TaskContext {
    pub agent: String,
    pub client: Arc<dyn BotClient>,
    pub config: Arc<FleetConfig>,
    pub token: CancellationToken,
}

impl TaskContext {
    pub fn new(
        client: Arc<dyn BotClient>,
        config: Arc<FleetConfig>,
        token: CancellationToken,
    ) -> Self {
        Self {
            agent: client.username().to_string(),
            client,
            config,
            token,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns false if the task was cancelled.
    pub async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => !self.token.is_cancelled(),
        }
    }

    /// Distance from the agent to the centre of a cell.
    pub async fn distance_to(&self, pos: BlockPos) -> f64 {
        self.client.position().await.distance_to(pos.center())
    }

    pub async fn within_reach(&self, pos: BlockPos) -> bool {
        self.distance_to(pos).await <= self.config.reach
    }
}

/// The slot entry for a running mine/collect task.
pub(crate) struct ForegroundTask {
    pub id: Uuid,
    pub kind: TaskKind,
    pub token: CancellationToken,
    /// Cancelled by the task itself once it has fully exited.
    pub done: CancellationToken,
    pub handle: JoinHandle<()>,
}

impl ForegroundTask {
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled() || self.handle.is_finished()
    }

    /// Cancellation was requested but the loop has not exited yet.
    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled() && !self.is_finished()
    }
}

/// Shortest period a [`PeriodicTask`] will run at.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A repeating timer task. Dropping it stops the timer.
pub struct PeriodicTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Run `tick` every `period`, first after one full period.
    ///
    /// Periods shorter than a millisecond are raised to one.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => tick().await,
                }
            }
        });
        Self { token, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }

    /// Stop the timer. No tick starts after this returns.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}
