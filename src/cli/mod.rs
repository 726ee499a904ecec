//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ExposurePolicy;
use crate::geometry::Vec3;

#[derive(Parser, Debug, Clone)]
#[command(name = "fleetcraft", version, about = "Drive a fleet of game agents from one console")]
pub struct Cli {
    /// Cell filter for mining: loose (attempt every block) or strict (exposed blocks only)
    #[arg(long, env = "FLEET_EXPOSURE_POLICY")]
    pub exposure_policy: Option<ExposurePolicy>,

    /// Spawn point of the sandbox world, as x,y,z
    #[arg(long, value_parser = parse_spawn, allow_hyphen_values = true)]
    pub spawn: Option<Vec3>,

    /// Run the commands in this file before opening the console
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Version reported by the sandbox world
    #[arg(long, env = "FLEET_WORLD_VERSION", default_value = "1.20.4")]
    pub world_version: String,

    /// Start the sandbox with no terrain
    #[arg(long)]
    pub empty_world: bool,

    /// Keep console history in this file
    #[arg(long, env = "FLEET_HISTORY")]
    pub history: Option<PathBuf>,
}

/// Parse `x,y,z` into a position.
pub fn parse_spawn(value: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got '{}'", value));
    };
    let coord = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", s))
    };
    Ok(Vec3::new(coord(x)?, coord(y)?, coord(z)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spawn() {
        assert_eq!(parse_spawn("1, 64,-3.5"), Ok(Vec3::new(1.0, 64.0, -3.5)));
        assert!(parse_spawn("1,2").is_err());
        assert!(parse_spawn("a,b,c").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "fleetcraft",
            "--exposure-policy",
            "strict",
            "--spawn",
            "-5,70,5",
            "--script",
            "setup.fleet",
        ])
        .unwrap();
        assert_eq!(cli.exposure_policy, Some(ExposurePolicy::Strict));
        assert_eq!(cli.spawn, Some(Vec3::new(-5.0, 70.0, 5.0)));
        assert_eq!(cli.script, Some(PathBuf::from("setup.fleet")));
        assert!(!cli.empty_world);
    }
}
