//! Reachability and obstacle classification.

use crate::geometry::{BlockPos, Vec3};
use crate::world::{Block, BotClient, is_air, is_transparent};

/// Eye height above the agent's feet.
pub const EYE_HEIGHT: f64 = 1.62;

/// Spacing of samples along the approach line.
const PROBE_STEP: f64 = 0.5;

/// True if any face-adjacent neighbour of `pos` is open.
pub fn is_exposed<F>(pos: BlockPos, is_open: F) -> bool
where
    F: Fn(BlockPos) -> bool,
{
    pos.neighbors().into_iter().any(is_open)
}

/// [`is_exposed`] against the live world. Unloaded neighbours count as solid.
pub async fn is_exposed_live(client: &dyn BotClient, pos: BlockPos) -> bool {
    let mut open = Vec::with_capacity(6);
    for neighbor in pos.neighbors() {
        if let Some(block) = client.block_at(neighbor).await {
            if is_air(&block.name) {
                open.push(neighbor);
            }
        }
    }
    is_exposed(pos, |p| open.contains(&p))
}

/// True if `block` stands in the way of reaching a `target_name` block.
pub fn is_obstruction(block: &Block, target_name: &str) -> bool {
    block.name != target_name && !is_transparent(&block.name)
}

/// Cells crossed by the line from the agent's eyes toward `target`.
///
/// Only the first `probe` blocks of the line are sampled. The agent's own
/// cells and the target are never included.
pub fn approach_cells(feet: Vec3, target: BlockPos, probe: u32) -> Vec<BlockPos> {
    let eye = Vec3::new(feet.x, feet.y + EYE_HEIGHT, feet.z);
    let end = target.center();
    let length = eye.distance_to(end);
    if length <= f64::EPSILON {
        return Vec::new();
    }

    let own = [feet.block(), feet.block().offset(0, 1, 0)];
    let limit = length.min(probe as f64);
    let mut cells: Vec<BlockPos> = Vec::new();
    let mut t = PROBE_STEP;
    while t <= limit {
        let k = t / length;
        let sample = Vec3::new(
            eye.x + (end.x - eye.x) * k,
            eye.y + (end.y - eye.y) * k,
            eye.z + (end.z - eye.z) * k,
        );
        let cell = sample.block();
        if cell != target && !own.contains(&cell) && !cells.contains(&cell) {
            cells.push(cell);
        }
        t += PROBE_STEP;
    }
    cells
}
