//! Cuboid mining.
//!
//! The engine visits every cell of a [`Region`] nearest-first from where the
//! agent stood when the sweep began. Each cell is resolved live, skipped if
//! empty (or enclosed, under the strict exposure policy), approached if out
//! of reach, and dug with the most worn suitable tool. Per-cell failures are
//! logged and never abort the sweep; a cell still out of reach after moving
//! is re-queued at most `mine_retries` times.

use std::collections::VecDeque;

use crate::agent::movement::{self, Arrival};
use crate::agent::reach::is_exposed_live;
use crate::agent::tools::select_tool_for_block;
use crate::agent::TaskContext;
use crate::error::ActionError;
use crate::geometry::{BlockPos, Region};

/// Tally of a finished (or cancelled) sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiningReport {
    /// Cells dug successfully.
    pub dug: u32,
    /// Dig attempts the world rejected.
    pub failed: u32,
    /// Cells that were air or not loaded.
    pub skipped: u32,
    /// Cells skipped for having no open face.
    pub enclosed: u32,
    /// Cells still out of reach once their retries ran out.
    pub unreachable: u32,
    /// Cells put back in the queue for another attempt.
    pub requeued: u32,
    /// True if the sweep stopped before the queue emptied.
    pub cancelled: bool,
}

impl MiningReport {
    /// Number of dig actions issued.
    pub fn dig_attempts(&self) -> u32 {
        self.dug + self.failed
    }
}

#[derive(Debug)]
enum CellOutcome {
    Dug,
    DigFailed,
    Empty,
    Enclosed,
    OutOfReach,
    Cancelled,
}

/// Mine every cell of `region` until it is exhausted or the task is cancelled.
pub async fn mine_region(ctx: &TaskContext, region: Region) -> MiningReport {
    let origin = ctx.client.position().await;
    let mut queue: VecDeque<(BlockPos, u32)> = region
        .cells_nearest_first(origin)
        .into_iter()
        .map(|pos| (pos, 0))
        .collect();
    let mut report = MiningReport::default();

    tracing::info!(
        agent = %ctx.agent,
        "Mining {} ({} cells, {} policy)",
        region,
        queue.len(),
        ctx.config.exposure_policy
    );

    while let Some((pos, retries)) = queue.pop_front() {
        if ctx.is_cancelled() {
            report.cancelled = true;
            break;
        }

        match mine_cell(ctx, pos).await {
            CellOutcome::Dug => report.dug += 1,
            CellOutcome::DigFailed => report.failed += 1,
            CellOutcome::Empty => report.skipped += 1,
            CellOutcome::Enclosed => report.enclosed += 1,
            CellOutcome::OutOfReach if retries < ctx.config.mine_retries => {
                tracing::info!(agent = %ctx.agent, "Re-queueing block at {}", pos);
                report.requeued += 1;
                queue.push_back((pos, retries + 1));
            }
            CellOutcome::OutOfReach => {
                tracing::warn!(agent = %ctx.agent, "Still cannot reach block at {}", pos);
                report.unreachable += 1;
            }
            CellOutcome::Cancelled => {
                report.cancelled = true;
                break;
            }
        }
    }

    ctx.client.clear_goal().await;
    tracing::info!(agent = %ctx.agent, "Mining finished: {:?}", report);
    report
}

async fn mine_cell(ctx: &TaskContext, pos: BlockPos) -> CellOutcome {
    let Some(block) = ctx.client.block_at(pos).await else {
        tracing::info!(agent = %ctx.agent, "Block at {} is not loaded", pos);
        return CellOutcome::Empty;
    };

    if block.is_air() {
        tracing::info!(agent = %ctx.agent, "Block at {} is air", pos);
        return CellOutcome::Empty;
    }

    if ctx.config.exposure_policy.requires_exposure()
        && !is_exposed_live(ctx.client.as_ref(), pos).await
    {
        tracing::info!(agent = %ctx.agent, "Block at {} has no open face", pos);
        return CellOutcome::Enclosed;
    }

    let inventory = ctx.client.inventory().await;
    if let Some(tool) = select_tool_for_block(&inventory, &block.name) {
        tracing::debug!(agent = %ctx.agent, "Selecting tool: {}", tool.name);
        if let Err(e) = ctx.client.equip(tool).await {
            tracing::warn!(agent = %ctx.agent, "Failed to equip {}: {}", tool.name, e);
        }
    }

    if !ctx.within_reach(pos).await {
        tracing::info!(agent = %ctx.agent, "Moving to block at {}", pos);
        match movement::go_to(ctx, pos, ctx.config.move_timeout).await {
            Arrival::Cancelled => return CellOutcome::Cancelled,
            Arrival::Failed(ActionError::Disconnected) => return CellOutcome::Cancelled,
            Arrival::Failed(e) => {
                tracing::warn!(agent = %ctx.agent, "Pathing to {} failed: {}", pos, e);
            }
            Arrival::Arrived | Arrival::TimedOut => {}
        }
        if !ctx.within_reach(pos).await {
            return CellOutcome::OutOfReach;
        }
    }

    tracing::info!(agent = %ctx.agent, "Digging block at {}", pos);
    let outcome = match ctx.client.dig(pos).await {
        Ok(()) => CellOutcome::Dug,
        Err(ActionError::Disconnected) => return CellOutcome::Cancelled,
        Err(e) => {
            tracing::warn!(agent = %ctx.agent, "Failed to dig block at {}: {}", pos, e);
            CellOutcome::DigFailed
        }
    };

    ctx.pause(ctx.config.dig_cooldown).await;
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::config::{ExposurePolicy, FleetConfig};
    use crate::geometry::Vec3;
    use crate::world::memory::{MemoryConnector, MemoryWorld, Movement};
    use crate::world::Item;

    fn context(world: &MemoryWorld, config: FleetConfig) -> TaskContext {
        let (client, _events) = MemoryConnector::new(world.clone()).attach("miner").unwrap();
        TaskContext::new(client, Arc::new(config), CancellationToken::new())
    }

    fn cube() -> Region {
        Region::new(BlockPos::new(0, 0, 0), BlockPos::new(1, 1, 1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_air_cube_digs_only_solid_cells() {
        let world = MemoryWorld::default();
        let ctx = context(&world, FleetConfig::default());
        for pos in cube().cells().filter(|p| p.y == 0) {
            world.set_block(pos, "stone");
        }

        let report = mine_region(&ctx, cube()).await;

        assert_eq!(report.dug, 4);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.dig_attempts(), 4);
        assert!(!report.cancelled);
        assert_eq!(world.digs("miner").len(), 4);
        assert!(cube().cells().all(|p| world.block_name(p) == "air"));
        assert_eq!(world.goal("miner"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cells_visited_nearest_first() {
        let world = MemoryWorld::default();
        let region = Region::new(BlockPos::new(0, 0, 0), BlockPos::new(3, 0, 0));
        world.fill(region, "dirt");
        let ctx = context(&world, FleetConfig::default());
        world.set_bot_position("miner", Vec3::new(3.5, 1.0, 0.5));

        mine_region(&ctx, region).await;

        let xs: Vec<i32> = world.digs("miner").iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equips_most_worn_tool() {
        let world = MemoryWorld::default();
        let ctx = context(&world, FleetConfig::default());
        world.give("miner", Item::tool("diamond_pickaxe", 1561, 1561));
        world.give("miner", Item::tool("iron_pickaxe", 250, 12));
        world.set_block(BlockPos::new(1, 0, 0), "stone");

        mine_region(&ctx, Region::new(BlockPos::new(1, 0, 0), BlockPos::new(1, 0, 0))).await;

        assert_eq!(world.equipped("miner").as_deref(), Some("iron_pickaxe"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_to_distant_cells() {
        let world = MemoryWorld::default();
        let ctx = context(&world, FleetConfig::default());
        let far = BlockPos::new(20, 0, 0);
        world.set_block(far, "stone");

        let report = mine_region(&ctx, Region::new(far, far)).await;

        assert_eq!(report.dug, 1);
        assert_eq!(world.goal_history("miner"), vec![crate::world::Goal::Block(far)]);
        assert_eq!(world.goal("miner"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_cells_retry_once_then_give_up() {
        let world = MemoryWorld::default().with_movement(Movement::Frozen);
        let region = Region::new(BlockPos::new(20, 0, 0), BlockPos::new(21, 0, 0));
        world.fill(region, "stone");
        let ctx = context(
            &world,
            FleetConfig::default().with_move_timeout(Duration::from_secs(1)),
        );

        let report = mine_region(&ctx, region).await;

        assert_eq!(report.requeued, 2);
        assert_eq!(report.unreachable, 2);
        assert_eq!(report.dig_attempts(), 0);
        // Two cells, each approached twice.
        assert_eq!(world.goal_history("miner").len(), 4);
        assert_eq!(world.goal("miner"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dig_failures_do_not_abort_sweep() {
        let world = MemoryWorld::default();
        world.fill(cube(), "bedrock");
        let ctx = context(&world, FleetConfig::default());

        let report = mine_region(&ctx, cube()).await;

        assert_eq!(report.failed, 8);
        assert_eq!(report.dug, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_policy_skips_enclosed_cells() {
        let world = MemoryWorld::default();
        // A 3x3x3 solid block: only the core has no open face.
        let solid = Region::new(BlockPos::new(-1, 1, -1), BlockPos::new(1, 3, 1));
        world.fill(solid, "stone");
        let ctx = context(
            &world,
            FleetConfig::default().with_exposure_policy(ExposurePolicy::Strict),
        );
        world.set_bot_position("miner", Vec3::new(0.5, 0.0, 0.5));
        let core = BlockPos::new(0, 2, 0);

        let report = mine_region(&ctx, Region::new(core, core)).await;

        assert_eq!(report.enclosed, 1);
        assert_eq!(world.block_name(core), "stone");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_within_one_cycle() {
        let world = MemoryWorld::default();
        let region = Region::new(BlockPos::new(0, 0, 0), BlockPos::new(2, 0, 2));
        world.fill(region, "stone");
        let ctx = context(&world, FleetConfig::default());
        let token = ctx.token.clone();

        let task = {
            let ctx = ctx.clone();
            tokio::spawn(async move { mine_region(&ctx, region).await })
        };
        // Two digs complete (cooldown 500ms each), then cancel mid-cooldown.
        tokio::time::sleep(Duration::from_millis(750)).await;
        token.cancel();
        let report = task.await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.dug, 2);
        assert_eq!(world.digs("miner").len(), 2);
        assert_eq!(world.goal("miner"), None);
    }
}
