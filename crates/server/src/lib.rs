#![warn(missing_docs)]
//! Headless simulation host: the ticket registry, per-world levels, world
//! activation and persistence.

mod level;
pub mod persist;
mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use chunkhold_content::RetentionSettings;
use chunkhold_core::{BlockPos, SimTick, WorldKey};
use chunkhold_retention::{validate_world, ValidationReport};
use tracing::{debug, info, warn};

pub use level::{Block, BlockSave, Level, LevelError};
pub use registry::{RegistrySave, TicketEntry, TicketRegistry};

use persist::{LevelFile, ServerMeta, SAVE_VERSION};

/// Owns every level and the registry they share.
#[derive(Debug)]
pub struct Server {
    registry: Arc<TicketRegistry>,
    settings: Arc<RetentionSettings>,
    levels: BTreeMap<WorldKey, Level>,
    active: BTreeSet<WorldKey>,
    current_tick: SimTick,
    last_save_dir: Option<PathBuf>,
}

impl Server {
    /// Fresh server with an empty registry and no levels.
    pub fn new(settings: RetentionSettings) -> Self {
        Self::with_registry(settings, Arc::new(TicketRegistry::new()))
    }

    /// Fresh server around an existing registry.
    pub fn with_registry(settings: RetentionSettings, registry: Arc<TicketRegistry>) -> Self {
        Self {
            registry,
            settings: Arc::new(settings),
            levels: BTreeMap::new(),
            active: BTreeSet::new(),
            current_tick: SimTick::ZERO,
            last_save_dir: None,
        }
    }

    /// The shared ticket authority.
    pub fn registry(&self) -> &Arc<TicketRegistry> {
        &self.registry
    }

    /// Chunk loading rules handed to every machine.
    pub fn settings(&self) -> &RetentionSettings {
        &self.settings
    }

    /// Ticks run so far.
    pub fn current_tick(&self) -> SimTick {
        self.current_tick
    }

    /// Level of `world`, created empty if missing.
    pub fn level_or_create(&mut self, world: &WorldKey) -> &mut Level {
        let settings = &self.settings;
        let registry = &self.registry;
        self.levels.entry(world.clone()).or_insert_with(|| {
            debug!(%world, "creating level");
            Level::new(world.clone(), settings.clone(), registry.handle())
        })
    }

    /// Level of `world`.
    pub fn level(&self, world: &WorldKey) -> Option<&Level> {
        self.levels.get(world)
    }

    /// Mutable level of `world`.
    pub fn level_mut(&mut self, world: &WorldKey) -> Option<&mut Level> {
        self.levels.get_mut(world)
    }

    /// Loaded worlds in key order.
    pub fn worlds(&self) -> impl Iterator<Item = &WorldKey> {
        self.levels.keys()
    }

    /// Whether `world` is being ticked.
    pub fn is_active(&self, world: &WorldKey) -> bool {
        self.active.contains(world)
    }

    /// Bring `world` online: reconcile the registry against the level's
    /// machines, then include it in [`tick`](Self::tick).
    pub fn activate_world(&mut self, world: &WorldKey) -> ValidationReport {
        let registry = self.registry.clone();
        let level = self.level_or_create(world);
        let report = validate_world(world, &*registry, level);
        self.active.insert(world.clone());
        info!(
            %world,
            anchors = report.anchors,
            orphaned = report.orphaned,
            released = report.released,
            repaired = report.repaired,
            "world activated"
        );
        report
    }

    /// Start ticking `world` without validating its tickets first. Machines
    /// still re-register on their first tick.
    pub fn resume_world(&mut self, world: &WorldKey) {
        self.level_or_create(world);
        self.active.insert(world.clone());
        info!(%world, "world resumed without validation");
    }

    /// Stop ticking `world`. Its machines keep whatever they hold.
    pub fn deactivate_world(&mut self, world: &WorldKey) -> bool {
        self.active.remove(world)
    }

    /// Run a single deterministic tick over every active world.
    pub fn tick(&mut self) {
        for world in &self.active {
            if let Some(level) = self.levels.get_mut(world) {
                level.tick();
            }
        }
        self.current_tick = self.current_tick.advance(1);
    }

    /// Move a machine between positions, possibly across worlds. Its old
    /// tickets are released immediately; the next tick of the destination
    /// world registers it again.
    pub fn transfer_machine(
        &mut self,
        from_world: &WorldKey,
        from: BlockPos,
        to_world: &WorldKey,
        to: BlockPos,
    ) -> Result<(), LevelError> {
        if self.levels.get(to_world).is_some_and(|level| level.is_occupied(to)) {
            return Err(LevelError::Occupied(to));
        }
        let source = self
            .levels
            .get_mut(from_world)
            .ok_or_else(|| LevelError::UnknownWorld(from_world.clone()))?;
        let mut machine = source.take_machine(from)?;
        machine.move_to(to);
        self.level_or_create(to_world).insert_machine(machine)?;
        debug!(%from_world, %from, %to_world, %to, "machine transferred");
        Ok(())
    }

    /// Tickets currently held across all worlds.
    pub fn ticket_count(&self) -> usize {
        self.registry.ticket_count()
    }

    /// Regions machines believe they hold, summed over worlds.
    pub fn retained_total(&self) -> usize {
        self.levels
            .values()
            .map(|level| level.retained_regions().len())
            .sum()
    }

    /// Write the registry, the metadata file and every level with unsaved
    /// changes into `dir`. Saving to a different directory than last time
    /// writes every level.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        let saved_at = Utc::now();
        let same_dir = self.last_save_dir.as_deref() == Some(dir);
        let mut written = 0;
        for (world, level) in &mut self.levels {
            if same_dir && !level.needs_save() {
                debug!(%world, "level unchanged, not rewriting");
                continue;
            }
            written += 1;
            let file = LevelFile {
                world: world.clone(),
                saved_at,
                blocks: level.save(),
            };
            persist::write_json(&persist::level_path(dir, world), &file)
                .with_context(|| format!("Failed to save level {world}"))?;
        }
        self.registry.save(&persist::tickets_path(dir))?;
        let meta = ServerMeta {
            version: SAVE_VERSION,
            saved_at,
            tick: self.current_tick.0,
            worlds: self.levels.keys().cloned().collect(),
        };
        persist::write_json(&persist::meta_path(dir), &meta)?;
        self.last_save_dir = Some(dir.to_path_buf());
        info!(
            dir = %dir.display(),
            worlds = self.levels.len(),
            levels_written = written,
            tickets = self.ticket_count(),
            tick = self.current_tick.0,
            "saved server"
        );
        Ok(())
    }

    /// Read a save written by [`save`](Self::save). A missing registry file
    /// starts an empty registry; every level starts inactive.
    pub fn load(dir: &Path, settings: RetentionSettings) -> Result<Self> {
        if !dir.exists() {
            anyhow::bail!("Save directory {} does not exist", dir.display());
        }
        let meta = persist::read_meta(dir)?;

        let tickets_path = persist::tickets_path(dir);
        let registry = if tickets_path.exists() {
            TicketRegistry::load(&tickets_path)?
        } else {
            warn!(path = %tickets_path.display(), "ticket registry missing, starting empty");
            TicketRegistry::new()
        };

        let mut server = Self::with_registry(settings, Arc::new(registry));
        server.current_tick = SimTick(meta.tick);
        server.last_save_dir = Some(dir.to_path_buf());
        for world in &meta.worlds {
            let file: LevelFile = persist::read_json(&persist::level_path(dir, world))?;
            if &file.world != world {
                anyhow::bail!("Level file for {} names world {}", world, file.world);
            }
            let level = Level::load(
                world.clone(),
                &file.blocks,
                server.settings.clone(),
                server.registry.handle(),
            )
            .with_context(|| format!("Failed to restore level {world}"))?;
            debug!(%world, blocks = level.len(), "loaded level");
            server.levels.insert(world.clone(), level);
        }
        info!(
            dir = %dir.display(),
            worlds = server.levels.len(),
            tick = meta.tick,
            saved_at = %meta.saved_at,
            "loaded server"
        );
        Ok(server)
    }
}
