//! Fleet-wide tuning knobs.
//!
//! Every value has a sensible default and can be overridden through the
//! environment (optionally via a `.env` file loaded with `dotenvy`).

use std::time::Duration;

use crate::error::ConfigError;

/// How strictly the mining engine filters cells before approaching them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExposurePolicy {
    /// Attempt every non-air cell regardless of its neighbours.
    #[default]
    Loose,
    /// Skip cells that have no air neighbour to approach from.
    Strict,
}

impl ExposurePolicy {
    /// Returns true if a cell must expose an open face before it is attempted.
    pub fn requires_exposure(&self) -> bool {
        matches!(self, ExposurePolicy::Strict)
    }
}

impl std::str::FromStr for ExposurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "loose" | "any" => Ok(ExposurePolicy::Loose),
            "strict" | "exposed" => Ok(ExposurePolicy::Strict),
            _ => Err(format!(
                "invalid exposure policy '{}', expected 'loose' or 'strict'",
                s
            )),
        }
    }
}

impl std::fmt::Display for ExposurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loose => write!(f, "loose"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Configuration shared by every agent in the fleet.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Distance within which dig/attack actions are possible.
    pub reach: f64,
    /// Pause after every dig, successful or not.
    pub dig_cooldown: Duration,
    /// How long Goal-Driven Movement waits for arrival.
    pub move_timeout: Duration,
    /// How often arrival is polled while moving.
    pub move_poll: Duration,
    /// Radius of the nearest-block search used by collection.
    pub search_radius: f64,
    /// Wait between searches when nothing matched.
    pub search_backoff: Duration,
    /// Dig attempts per block before collection abandons it.
    pub collect_attempts: u32,
    /// Re-attempts per mining cell that was out of reach after moving.
    pub mine_retries: u32,
    /// Cell filtering applied by the mining engine.
    pub exposure_policy: ExposurePolicy,
    /// How far along the approach line obstacles are cleared.
    pub obstacle_probe: u32,
    /// Default auto-click period.
    pub click_interval: Duration,
    /// Entity names the auto-clicker never attacks.
    pub click_denylist: Vec<String>,
    /// Period between circle formation goals.
    pub circle_interval: Duration,
    /// Limit for establishing a single connection.
    pub connect_timeout: Duration,
    /// Keep-alive period requested from the protocol client.
    pub keep_alive_interval: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            reach: 4.5,
            dig_cooldown: Duration::from_millis(500),
            move_timeout: Duration::from_secs(10),
            move_poll: Duration::from_millis(100),
            search_radius: 64.0,
            search_backoff: Duration::from_secs(1),
            collect_attempts: 5,
            mine_retries: 1,
            exposure_policy: ExposurePolicy::Loose,
            obstacle_probe: 3,
            click_interval: Duration::from_millis(1000),
            click_denylist: vec!["experience_orb".to_string()],
            circle_interval: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(30),
            keep_alive_interval: Duration::from_secs(10),
        }
    }
}

impl FleetConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("FLEET_REACH") {
            config.reach = parse_positive_f64("FLEET_REACH", &v)?;
        }
        if let Some(v) = lookup("FLEET_DIG_COOLDOWN_MS") {
            config.dig_cooldown = parse_millis("FLEET_DIG_COOLDOWN_MS", &v)?;
        }
        if let Some(v) = lookup("FLEET_MOVE_TIMEOUT_MS") {
            config.move_timeout = parse_millis("FLEET_MOVE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("FLEET_MOVE_POLL_MS") {
            config.move_poll = parse_period("FLEET_MOVE_POLL_MS", &v)?;
        }
        if let Some(v) = lookup("FLEET_SEARCH_RADIUS") {
            config.search_radius = parse_positive_f64("FLEET_SEARCH_RADIUS", &v)?;
        }
        if let Some(v) = lookup("FLEET_SEARCH_BACKOFF_MS") {
            config.search_backoff = parse_millis("FLEET_SEARCH_BACKOFF_MS", &v)?;
        }
        if let Some(v) = lookup("FLEET_COLLECT_ATTEMPTS") {
            config.collect_attempts = parse_u32("FLEET_COLLECT_ATTEMPTS", &v)?.max(1);
        }
        if let Some(v) = lookup("FLEET_MINE_RETRIES") {
            config.mine_retries = parse_u32("FLEET_MINE_RETRIES", &v)?;
        }
        if let Some(v) = lookup("FLEET_EXPOSURE_POLICY") {
            config.exposure_policy = v.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "FLEET_EXPOSURE_POLICY".to_string(),
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = lookup("FLEET_OBSTACLE_PROBE") {
            config.obstacle_probe = parse_u32("FLEET_OBSTACLE_PROBE", &v)?;
        }
        if let Some(v) = lookup("FLEET_CLICK_INTERVAL_MS") {
            config.click_interval = parse_period("FLEET_CLICK_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("FLEET_CLICK_DENYLIST") {
            config.click_denylist = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("FLEET_CIRCLE_INTERVAL_MS") {
            config.circle_interval = parse_period("FLEET_CIRCLE_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("FLEET_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = parse_millis("FLEET_CONNECT_TIMEOUT_MS", &v)?;
        }

        Ok(config)
    }

    /// Set the exposure policy.
    pub fn with_exposure_policy(mut self, policy: ExposurePolicy) -> Self {
        self.exposure_policy = policy;
        self
    }

    /// Set the dig cooldown.
    pub fn with_dig_cooldown(mut self, cooldown: Duration) -> Self {
        self.dig_cooldown = cooldown;
        self
    }

    /// Set the movement timeout.
    pub fn with_move_timeout(mut self, timeout: Duration) -> Self {
        self.move_timeout = timeout;
        self
    }

    /// Set the default auto-click period.
    pub fn with_click_interval(mut self, interval: Duration) -> Self {
        self.click_interval = interval;
        self
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| invalid(key, value, e.to_string()))
}

/// Like [`parse_millis`], but a zero period is rejected.
fn parse_period(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let period = parse_millis(key, value)?;
    if period.is_zero() {
        return Err(invalid(key, value, "must be at least 1ms"));
    }
    Ok(period)
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| invalid(key, value, e.to_string()))
}

fn parse_positive_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .map_err(|e| invalid(key, value, e.to_string()))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(invalid(key, value, "must be a positive number"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FleetConfig::default();
        assert_eq!(config.reach, 4.5);
        assert_eq!(config.dig_cooldown, Duration::from_millis(500));
        assert_eq!(config.search_radius, 64.0);
        assert_eq!(config.collect_attempts, 5);
        assert_eq!(config.mine_retries, 1);
        assert_eq!(config.exposure_policy, ExposurePolicy::Loose);
        assert_eq!(config.click_denylist, vec!["experience_orb".to_string()]);
    }

    #[test]
    fn test_env_overrides() {
        let config = FleetConfig::from_lookup(lookup_from(&[
            ("FLEET_REACH", "3"),
            ("FLEET_DIG_COOLDOWN_MS", "250"),
            ("FLEET_EXPOSURE_POLICY", "Strict"),
            ("FLEET_CLICK_DENYLIST", "experience_orb, item ,"),
        ]))
        .unwrap();

        assert_eq!(config.reach, 3.0);
        assert_eq!(config.dig_cooldown, Duration::from_millis(250));
        assert_eq!(config.exposure_policy, ExposurePolicy::Strict);
        assert_eq!(config.click_denylist, vec!["experience_orb", "item"]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = FleetConfig::from_lookup(lookup_from(&[("FLEET_DIG_COOLDOWN_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("FLEET_DIG_COOLDOWN_MS"));

        assert!(FleetConfig::from_lookup(lookup_from(&[("FLEET_REACH", "-1")])).is_err());
        assert!(FleetConfig::from_lookup(lookup_from(&[("FLEET_EXPOSURE_POLICY", "maybe")])).is_err());
    }

    #[test]
    fn test_zero_periods_are_rejected() {
        for key in [
            "FLEET_CLICK_INTERVAL_MS",
            "FLEET_CIRCLE_INTERVAL_MS",
            "FLEET_MOVE_POLL_MS",
        ] {
            let err = FleetConfig::from_lookup(lookup_from(&[(key, "0")])).unwrap_err();
            assert!(err.to_string().contains(key));
        }

        let config =
            FleetConfig::from_lookup(lookup_from(&[("FLEET_CLICK_INTERVAL_MS", "1")])).unwrap();
        assert_eq!(config.click_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_collect_attempts_never_zero() {
        let config =
            FleetConfig::from_lookup(lookup_from(&[("FLEET_COLLECT_ATTEMPTS", "0")])).unwrap();
        assert_eq!(config.collect_attempts, 1);
    }

    #[test]
    fn test_exposure_policy_parsing() {
        assert_eq!("loose".parse::<ExposurePolicy>(), Ok(ExposurePolicy::Loose));
        assert_eq!("EXPOSED".parse::<ExposurePolicy>(), Ok(ExposurePolicy::Strict));
        assert!(ExposurePolicy::Strict.requires_exposure());
        assert!(!ExposurePolicy::Loose.requires_exposure());
    }
}
