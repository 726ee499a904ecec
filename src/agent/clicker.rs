//! Auto-clicker behaviour.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::PeriodicTask;
use crate::world::BotClient;

/// Periodically attacks whatever the agent is aiming at.
pub struct AutoClicker {
    interval: Duration,
    denylist: Arc<Vec<String>>,
    task: Option<PeriodicTask>,
}

impl AutoClicker {
    pub fn new(interval: Duration, denylist: Vec<String>) -> Self {
        Self {
            interval,
            denylist: Arc::new(denylist),
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(PeriodicTask::is_running)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start clicking. Returns false if already running.
    pub fn start(&mut self, client: Arc<dyn BotClient>) -> bool {
        if self.is_running() {
            return false;
        }
        let denylist = Arc::clone(&self.denylist);
        self.task = Some(PeriodicTask::spawn(self.interval, move || {
            let client = Arc::clone(&client);
            let denylist = Arc::clone(&denylist);
            async move { click_once(client.as_ref(), &denylist).await }
        }));
        true
    }

    /// Stop clicking. Returns false if it was not running.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                let was_running = task.is_running();
                task.cancel();
                was_running
            }
            None => false,
        }
    }

    /// Change the period. A running timer is replaced, never duplicated.
    ///
    /// Returns true if a running timer was restarted.
    pub fn set_interval(&mut self, client: Arc<dyn BotClient>, interval: Duration) -> bool {
        self.interval = interval;
        if self.stop() {
            self.start(client);
            true
        } else {
            false
        }
    }
}

/// One click: attack the aimed entity, or swing at nothing.
pub async fn click_once(client: &dyn BotClient, denylist: &[String]) {
    match client.entity_at_cursor().await {
        Some(entity) if !denylist.contains(&entity.name) => {
            tracing::trace!(agent = %client.username(), "Attacking {}", entity.name);
            client.attack(&entity).await;
        }
        _ => client.swing_arm().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::world::Entity;
    use crate::world::memory::{MemoryConnector, MemoryWorld};

    fn zombie() -> Entity {
        Entity {
            id: 7,
            name: "zombie".into(),
            position: Vec3::new(1.0, 0.0, 0.0),
        }
    }

    fn clicker() -> AutoClicker {
        AutoClicker::new(Duration::from_millis(1000), vec!["experience_orb".into()])
    }

    #[tokio::test]
    async fn test_click_respects_denylist() {
        let world = MemoryWorld::default();
        let (client, _events) = MemoryConnector::new(world.clone()).attach("c").unwrap();
        let denylist = vec!["experience_orb".to_string()];

        click_once(client.as_ref(), &denylist).await;
        assert_eq!(world.swings("c"), 1);

        world.set_cursor(
            "c",
            Some(Entity {
                id: 1,
                name: "experience_orb".into(),
                position: Vec3::default(),
            }),
        );
        click_once(client.as_ref(), &denylist).await;
        assert_eq!(world.swings("c"), 2);
        assert!(world.attacks("c").is_empty());

        world.set_cursor("c", Some(zombie()));
        click_once(client.as_ref(), &denylist).await;
        assert_eq!(world.attacks("c"), vec!["zombie".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let world = MemoryWorld::default();
        let (client, _events) = MemoryConnector::new(world.clone()).attach("c").unwrap();
        world.set_cursor("c", Some(zombie()));
        let mut clicker = clicker();

        assert!(clicker.start(Arc::clone(&client)));
        assert!(!clicker.start(Arc::clone(&client)));
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(world.attacks("c").len(), 3);
        assert!(clicker.stop());
        assert!(!clicker.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_change_restarts_single_timer() {
        let world = MemoryWorld::default();
        let (client, _events) = MemoryConnector::new(world.clone()).attach("c").unwrap();
        world.set_cursor("c", Some(zombie()));
        let mut clicker = clicker();

        clicker.start(Arc::clone(&client));
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(world.attacks("c").len(), 3);

        assert!(clicker.set_interval(Arc::clone(&client), Duration::from_millis(500)));
        tokio::time::sleep(Duration::from_millis(2100)).await;

        // 3 at the old pace, then 4 at the new one; a leftover old timer
        // would have added two more.
        assert_eq!(world.attacks("c").len(), 7);
        assert_eq!(clicker.interval(), Duration::from_millis(500));
        clicker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_change_while_stopped_does_not_start() {
        let world = MemoryWorld::default();
        let (client, _events) = MemoryConnector::new(world.clone()).attach("c").unwrap();
        let mut clicker = clicker();

        assert!(!clicker.set_interval(client, Duration::from_millis(200)));
        assert!(!clicker.is_running());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(world.swings("c"), 0);
    }
}
