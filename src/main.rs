use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fleetcraft::channels::{ConsoleChannel, ScriptChannel, serve};
use fleetcraft::cli::Cli;
use fleetcraft::config::FleetConfig;
use fleetcraft::fleet::Dispatcher;
use fleetcraft::geometry::{BlockPos, Region, Vec3};
use fleetcraft::world::memory::{MemoryConnector, MemoryWorld};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fleetcraft=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = FleetConfig::from_env()?;
    if let Some(policy) = cli.exposure_policy {
        config = config.with_exposure_policy(policy);
    }
    tracing::info!("Exposure policy: {}", config.exposure_policy);

    let world = sandbox_world(&cli, &config);
    let dispatcher = Dispatcher::new(Arc::new(MemoryConnector::new(world)), Arc::new(config));

    if let Some(path) = &cli.script {
        serve(&ScriptChannel::new(path), &dispatcher).await?;
    }

    let mut console = ConsoleChannel::new();
    if let Some(path) = &cli.history {
        console = console.with_history(path);
    }
    println!("fleetcraft ready. Type 'help' for commands.");
    serve(&console, &dispatcher).await?;

    dispatcher.shutdown_all().await;
    Ok(())
}

/// Offline world the fleet connects to.
fn sandbox_world(cli: &Cli, config: &FleetConfig) -> MemoryWorld {
    let spawn = cli.spawn.unwrap_or(Vec3::new(0.5, 1.0, 0.5));
    let world = MemoryWorld::new(cli.world_version.clone())
        .with_spawn(spawn)
        .with_reach(config.reach);
    if cli.empty_world {
        return world;
    }

    let base = spawn.block();
    let at = |dx, dy, dz| base.offset(dx, dy, dz);

    // Layered ground under the spawn point.
    world.fill(Region::new(at(-16, -4, -16), at(16, -4, 16)), "bedrock");
    world.fill(Region::new(at(-16, -3, -16), at(16, -3, 16)), "stone");
    world.fill(Region::new(at(-16, -2, -16), at(16, -2, 16)), "dirt");
    world.fill(Region::new(at(-16, -1, -16), at(16, -1, 16)), "grass_block");

    for (x, z) in [(6, 4), (-8, 9), (11, -7)] {
        world.fill(Region::new(at(x, 0, z), at(x, 3, z)), "oak_log");
        world.fill(Region::new(at(x - 1, 4, z - 1), at(x + 1, 4, z + 1)), "oak_leaves");
    }
    for (pos, ore) in [
        (at(3, -3, 3), "coal_ore"),
        (at(-5, -3, 2), "iron_ore"),
        (at(9, -3, -9), "diamond_ore"),
    ] {
        world.set_block(pos, ore);
    }
    world.fill(
        Region::new(BlockPos::new(base.x + 12, base.y, base.z + 12), at(14, 1, 14)),
        "sand",
    );
    world
}
