//! Name → agent mapping.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agent::Agent;

/// Which agents a command addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `*`: every registered agent.
    All,
    /// Exactly one agent, by name.
    Named(String),
}

impl Selector {
    pub fn parse(token: &str) -> Self {
        if token == "*" {
            Selector::All
        } else {
            Selector::Named(token.to_string())
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::All => write!(f, "*"),
            Selector::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Owns every live agent.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, returning any agent it replaced under the same name.
    pub async fn insert(&self, agent: Arc<Agent>) -> Option<Arc<Agent>> {
        let mut agents = self.agents.write().await;
        agents.insert(agent.name().to_string(), agent)
    }

    pub async fn remove(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.write().await.remove(name)
    }

    /// Remove `name` only if it is still the agent with `id`.
    ///
    /// A reconnect under the same name must not be evicted by the old
    /// connection's disconnect.
    pub async fn remove_if_current(&self, name: &str, id: Uuid) -> Option<Arc<Agent>> {
        let mut agents = self.agents.write().await;
        if agents.get(name).is_some_and(|a| a.id() == id) {
            agents.remove(name)
        } else {
            None
        }
    }

    /// Resolve a selector. A missing named agent yields an empty list.
    pub async fn select(&self, selector: &Selector) -> Vec<Arc<Agent>> {
        let agents = self.agents.read().await;
        match selector {
            Selector::All => {
                let mut all: Vec<Arc<Agent>> = agents.values().cloned().collect();
                all.sort_by(|a, b| a.name().cmp(b.name()));
                all
            }
            Selector::Named(name) => agents.get(name).cloned().into_iter().collect(),
        }
    }

    /// Remove and return every agent, sorted by name.
    pub async fn drain(&self) -> Vec<Arc<Agent>> {
        let mut agents: Vec<Arc<Agent>> = self.agents.write().await.drain().map(|(_, a)| a).collect();
        agents.sort_by(|a, b| a.name().cmp(b.name()));
        agents
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }
}
