//! Goal-driven movement on top of the external pathfinder.

use std::time::Duration;

use crate::agent::TaskContext;
use crate::error::ActionError;
use crate::geometry::BlockPos;
use crate::world::Goal;

/// How a movement attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arrival {
    /// The agent is within reach of the target.
    Arrived,
    /// The timeout elapsed first.
    TimedOut,
    /// The task was cancelled while moving.
    Cancelled,
    /// The pathfinder rejected the goal.
    Failed(ActionError),
}

/// Walk toward `target` until it is within reach, the timeout elapses, or
/// the task is cancelled. The navigation goal is cleared on every exit.
pub async fn go_to(ctx: &TaskContext, target: BlockPos, timeout: Duration) -> Arrival {
    if ctx.is_cancelled() {
        return Arrival::Cancelled;
    }

    if let Err(e) = ctx.client.set_goal(Goal::Block(target)).await {
        ctx.client.clear_goal().await;
        return Arrival::Failed(e);
    }

    let arrival = tokio::select! {
        _ = ctx.token.cancelled() => Arrival::Cancelled,
        arrival = wait_for_reach(ctx, target, timeout) => arrival,
    };

    ctx.client.clear_goal().await;
    tracing::debug!(agent = %ctx.agent, target = %target, "Movement ended: {:?}", arrival);
    arrival
}

async fn wait_for_reach(ctx: &TaskContext, target: BlockPos, timeout: Duration) -> Arrival {
    let poll = async {
        loop {
            if ctx.within_reach(target).await {
                return;
            }
            tokio::time::sleep(ctx.config.move_poll).await;
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(()) => Arrival::Arrived,
        Err(_) => Arrival::TimedOut,
    }
}
