//! Unbounded resource collection.
//!
//! Repeatedly finds the nearest block of one type and breaks it, until the
//! task is cancelled or the connection drops. Nothing in the world makes the
//! loop exit on its own: when no block is found it waits and searches again.

use std::collections::HashSet;

use crate::agent::movement::{self, Arrival};
use crate::agent::reach::{approach_cells, is_obstruction};
use crate::agent::TaskContext;
use crate::error::ActionError;
use crate::geometry::BlockPos;
use crate::world::BlockType;

/// Tally of a collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Target blocks broken.
    pub collected: u32,
    /// Target blocks given up on after the attempt ceiling.
    pub abandoned: u32,
    /// Obstacles removed from approach lines.
    pub obstacles_cleared: u32,
    /// Dig actions issued against target blocks.
    pub dig_attempts: u32,
    /// Searches that found nothing.
    pub empty_searches: u32,
}

enum DigOutcome {
    Collected,
    Exhausted,
    Stopped,
}

/// Collect `block_type` until the task is cancelled.
pub async fn collect_material(ctx: &TaskContext, block_type: BlockType) -> CollectionReport {
    let mut report = CollectionReport::default();
    let mut abandoned: HashSet<BlockPos> = HashSet::new();
    let radius = ctx.config.search_radius;

    tracing::info!(agent = %ctx.agent, "Collecting {}", block_type.name);

    while !ctx.is_cancelled() {
        let candidates = ctx
            .client
            .find_blocks(block_type.id, radius, abandoned.len() + 1)
            .await;
        let Some(target) = candidates.into_iter().find(|p| !abandoned.contains(p)) else {
            tracing::info!(
                agent = %ctx.agent,
                "No {} found within {} blocks",
                block_type.name,
                radius
            );
            report.empty_searches += 1;
            ctx.pause(ctx.config.search_backoff).await;
            continue;
        };

        if !ctx.within_reach(target).await {
            tracing::info!(agent = %ctx.agent, "Moving to block at {}", target);
            match movement::go_to(ctx, target, ctx.config.move_timeout).await {
                Arrival::Cancelled | Arrival::Failed(ActionError::Disconnected) => break,
                Arrival::Failed(e) => {
                    tracing::warn!(agent = %ctx.agent, "Pathing to {} failed: {}", target, e);
                    ctx.pause(ctx.config.search_backoff).await;
                }
                Arrival::Arrived | Arrival::TimedOut => {}
            }
            // The world may have changed while walking; start over.
            continue;
        }

        report.obstacles_cleared += clear_obstacles(ctx, target, &block_type.name).await;

        match dig_target(ctx, target, &block_type.name, &mut report).await {
            DigOutcome::Collected => report.collected += 1,
            DigOutcome::Exhausted => {
                tracing::warn!(
                    agent = %ctx.agent,
                    "Giving up on {} at {} after {} attempts",
                    block_type.name,
                    target,
                    ctx.config.collect_attempts
                );
                abandoned.insert(target);
                report.abandoned += 1;
            }
            DigOutcome::Stopped => break,
        }
    }

    ctx.client.clear_goal().await;
    tracing::info!(agent = %ctx.agent, "Collection stopped: {:?}", report);
    report
}

/// Break non-transparent blocks between the agent and the target.
async fn clear_obstacles(ctx: &TaskContext, target: BlockPos, target_name: &str) -> u32 {
    let feet = ctx.client.position().await;
    let mut cleared = 0;

    for cell in approach_cells(feet, target, ctx.config.obstacle_probe) {
        if ctx.is_cancelled() {
            break;
        }
        let Some(block) = ctx.client.block_at(cell).await else {
            continue;
        };
        if !is_obstruction(&block, target_name) {
            continue;
        }

        tracing::debug!(agent = %ctx.agent, "Clearing {} at {}", block.name, cell);
        match ctx.client.dig(cell).await {
            Ok(()) => cleared += 1,
            Err(e) => tracing::debug!(agent = %ctx.agent, "Could not clear {}: {}", cell, e),
        }
        ctx.pause(ctx.config.dig_cooldown).await;
    }

    cleared
}

/// Dig the target until it changes, up to the attempt ceiling.
async fn dig_target(
    ctx: &TaskContext,
    target: BlockPos,
    target_name: &str,
    report: &mut CollectionReport,
) -> DigOutcome {
    for attempt in 1..=ctx.config.collect_attempts {
        if ctx.is_cancelled() {
            return DigOutcome::Stopped;
        }

        tracing::info!(agent = %ctx.agent, "Digging block at {} (attempt {})", target, attempt);
        report.dig_attempts += 1;
        match ctx.client.dig(target).await {
            Ok(()) => {}
            Err(ActionError::Disconnected) => return DigOutcome::Stopped,
            Err(ActionError::Interrupted) => {
                if ctx.is_cancelled() {
                    return DigOutcome::Stopped;
                }
            }
            Err(e) => {
                tracing::warn!(agent = %ctx.agent, "Failed to collect {}: {}", target_name, e);
            }
        }

        let gone = match ctx.client.block_at(target).await {
            Some(block) => block.name != target_name,
            None => false,
        };
        let resumed = ctx.pause(ctx.config.dig_cooldown).await;

        if gone {
            return DigOutcome::Collected;
        }
        if !resumed {
            return DigOutcome::Stopped;
        }
    }

    DigOutcome::Exhausted
}
