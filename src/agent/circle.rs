//! Ring formation around a player.
//!
//! Every agent circling the same player is given a [`RingSlot`]; slots are
//! spread evenly around the circle so the fleet forms a ring instead of
//! bunching up. Each tick re-reads the player's position and hands the
//! pathfinder a fresh goal without waiting for arrival.

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::PeriodicTask;
use crate::geometry::Vec3;
use crate::world::{BotClient, Goal};

/// How close to its ring point an agent tries to stay.
const RING_TOLERANCE: f64 = 1.0;

/// An agent's place among `total` agents sharing a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSlot {
    pub index: usize,
    pub total: usize,
}

impl RingSlot {
    pub fn new(index: usize, total: usize) -> Self {
        Self {
            index,
            total: total.max(1),
        }
    }

    /// Angular offset of this slot in radians.
    pub fn angle(&self) -> f64 {
        2.0 * PI * self.index as f64 / self.total as f64
    }
}

/// The point on the ring for `slot`, level with `center`.
pub fn ring_point(center: Vec3, radius: f64, slot: RingSlot) -> Vec3 {
    let angle = slot.angle();
    Vec3::new(
        center.x + radius * angle.cos(),
        center.y,
        center.z + radius * angle.sin(),
    )
}

#[derive(Debug, Clone)]
struct Formation {
    target: String,
    radius: f64,
    slot: RingSlot,
}

/// Keeps an agent on its slot of a ring around a moving player.
pub struct CircleBehavior {
    interval: Duration,
    formation: Option<Formation>,
    task: Option<PeriodicTask>,
}

impl CircleBehavior {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            formation: None,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(PeriodicTask::is_running)
    }

    /// Player being circled, if running.
    pub fn target(&self) -> Option<&str> {
        if !self.is_running() {
            return None;
        }
        self.formation.as_ref().map(|f| f.target.as_str())
    }

    /// Start circling. Returns false if already running.
    pub fn start(
        &mut self,
        client: Arc<dyn BotClient>,
        target: &str,
        radius: f64,
        slot: RingSlot,
    ) -> bool {
        if self.is_running() {
            return false;
        }

        self.spawn(
            client,
            Formation {
                target: target.to_string(),
                radius,
                slot,
            },
        );
        true
    }

    /// Move a running formation to another slot. Returns false if idle.
    pub fn set_slot(&mut self, client: Arc<dyn BotClient>, slot: RingSlot) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(formation) = self.formation.clone() else {
            return false;
        };
        if formation.slot != slot {
            self.task = None;
            self.spawn(client, Formation { slot, ..formation });
        }
        true
    }

    fn spawn(&mut self, client: Arc<dyn BotClient>, formation: Formation) {
        let tick = formation.clone();
        self.task = Some(PeriodicTask::spawn(self.interval, move || {
            let client = Arc::clone(&client);
            let formation = tick.clone();
            async move { steer(client.as_ref(), &formation).await }
        }));
        self.formation = Some(formation);
    }

    /// Stop circling and drop the navigation goal. Returns false if idle.
    pub async fn stop(&mut self, client: &dyn BotClient) -> bool {
        self.formation = None;
        let Some(task) = self.task.take() else {
            return false;
        };
        let was_running = task.is_running();
        task.cancel();
        client.clear_goal().await;
        was_running
    }
}

async fn steer(client: &dyn BotClient, formation: &Formation) {
    let Some(center) = client.player_position(&formation.target).await else {
        tracing::debug!(agent = %client.username(), "Lost sight of {}", formation.target);
        return;
    };
    let point = ring_point(center, formation.radius, formation.slot);
    let goal = Goal::Near {
        pos: point,
        range: RING_TOLERANCE,
    };
    if let Err(e) = client.set_goal(goal).await {
        tracing::debug!(agent = %client.username(), "Circle goal rejected: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::memory::{MemoryConnector, MemoryWorld, Movement};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_three_slots_are_120_degrees_apart() {
        let degrees: Vec<f64> = (0..3)
            .map(|i| RingSlot::new(i, 3).angle().to_degrees())
            .collect();
        assert!(approx(degrees[0], 0.0));
        assert!(approx(degrees[1], 120.0));
        assert!(approx(degrees[2], 240.0));
    }

    #[test]
    fn test_ring_point_lies_on_radius() {
        let center = Vec3::new(10.0, 64.0, -4.0);
        for i in 0..5 {
            let p = ring_point(center, 3.0, RingSlot::new(i, 5));
            assert!(approx(p.y, 64.0));
            let dx = p.x - center.x;
            let dz = p.z - center.z;
            assert!(approx((dx * dx + dz * dz).sqrt(), 3.0));
        }
        let first = ring_point(center, 3.0, RingSlot::new(0, 5));
        assert!(approx(first.x, 13.0) && approx(first.z, -4.0));
    }

    #[test]
    fn test_empty_ring_does_not_divide_by_zero() {
        assert!(approx(RingSlot::new(0, 0).angle(), 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_track_the_player_without_waiting() {
        let world = MemoryWorld::default().with_movement(Movement::Frozen);
        world.add_player("steve", Vec3::new(0.0, 64.0, 0.0));
        let (client, _events) = MemoryConnector::new(world.clone()).attach("c").unwrap();
        let mut circle = CircleBehavior::new(Duration::from_millis(1000));

        assert!(circle.start(Arc::clone(&client), "steve", 4.0, RingSlot::new(1, 4)));
        assert!(!circle.start(Arc::clone(&client), "steve", 4.0, RingSlot::new(1, 4)));
        assert_eq!(circle.target(), Some("steve"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        world.add_player("steve", Vec3::new(10.0, 64.0, 0.0));
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let goals = world.goal_history("c");
        assert_eq!(goals.len(), 2);
        let Goal::Near { pos, range } = &goals[1] else {
            panic!("expected a Near goal, got {:?}", goals[1]);
        };
        assert!(approx(*range, 1.0));
        assert!(approx(pos.x, 10.0) && approx(pos.z, 4.0));

        assert!(circle.stop(client.as_ref()).await);
        assert_eq!(world.goal("c"), None);
        assert!(!circle.stop(client.as_ref()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_slot_moves_a_running_formation() {
        let world = MemoryWorld::default().with_movement(Movement::Frozen);
        world.add_player("steve", Vec3::new(0.0, 64.0, 0.0));
        let (client, _events) = MemoryConnector::new(world.clone()).attach("c").unwrap();
        let mut circle = CircleBehavior::new(Duration::from_millis(1000));

        assert!(!circle.set_slot(Arc::clone(&client), RingSlot::new(1, 2)));
        assert!(circle.start(Arc::clone(&client), "steve", 2.0, RingSlot::new(0, 1)));
        assert!(circle.set_slot(Arc::clone(&client), RingSlot::new(1, 2)));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let Some(Goal::Near { pos, .. }) = world.goal("c") else {
            panic!("no ring goal");
        };
        assert!(approx(pos.x, -2.0) && approx(pos.z, 0.0));
        assert_eq!(world.goal_history("c").len(), 1);
    }
}
