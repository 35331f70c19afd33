use crate::config::HostConfig;
use anyhow::{Context, Result};
use chunkhold_content::{MachineKind, Upgrade};
use chunkhold_core::{BlockPos, RegionKey, WorldKey};
use chunkhold_server::{persist, Server};
use std::path::PathBuf;
use tracing::info;

pub struct HeadlessConfig {
    pub host: HostConfig,
    pub save_dir: PathBuf,
    pub no_save: bool,
    pub ticks: u64,
}

pub fn run(cfg: HeadlessConfig) -> Result<()> {
    let world = WorldKey::overworld();
    let mut server = open_server(&cfg)?;

    if cfg.host.host.validate_on_load {
        server.activate_world(&world);
    } else {
        server.resume_world(&world);
    }

    for _ in 0..cfg.ticks {
        server.tick();
    }

    info!(
        tick = server.current_tick().0,
        retained = server.retained_total(),
        tickets = server.ticket_count(),
        "run finished"
    );

    if cfg.no_save {
        info!("--no-save set, leaving save untouched");
        return Ok(());
    }
    server
        .save(&cfg.save_dir)
        .with_context(|| format!("failed to save to {}", cfg.save_dir.display()))
}

fn open_server(cfg: &HeadlessConfig) -> Result<Server> {
    let settings = cfg.host.retention.clone();
    if persist::meta_path(&cfg.save_dir).exists() {
        return Server::load(&cfg.save_dir, settings);
    }
    info!(dir = %cfg.save_dir.display(), "no save found, starting a new world");
    let mut server = Server::new(settings);
    place_starter_machines(&mut server, &WorldKey::overworld())?;
    Ok(server)
}

/// A quarry mining a neighbouring region and a stabilizer with a plus-shaped
/// grid, both fitted with anchors.
fn place_starter_machines(server: &mut Server, world: &WorldKey) -> Result<()> {
    let level = server.level_or_create(world);

    let quarry = level.place_machine(MachineKind::quarry(), BlockPos::new(8, 64, 8))?;
    quarry.install_upgrade(Upgrade::Anchor, 1)?;
    quarry.install_upgrade(Upgrade::Speed, 2)?;
    quarry.set_target(Some(RegionKey::new(1, 0)));

    let stabilizer = level.place_machine(MachineKind::stabilizer(), BlockPos::new(-40, 64, 72))?;
    stabilizer.install_upgrade(Upgrade::Anchor, 1)?;
    for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
        stabilizer.toggle_cell(dx, dz);
    }
    Ok(())
}
