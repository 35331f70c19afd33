//! Chunk-loading machines.
//!
//! A [`Machine`] pairs a kind-specific notion of which regions it wants kept
//! loaded with the generic [`Components`]. The retention component never
//! sees the machine itself, only a borrowed [`MachineView`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chunkhold_core::{BlockPos, RegionKey, RegionSet, WorldKey};
use chunkhold_retention::{
    ChunkRetention, LoadRequestSource, RetentionOwner, SharedAuthority, TileRecord,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Components, ContentError, RetentionSettings, Upgrade, UpgradeComponent, UpgradeError};

/// What a machine does, and therefore what it wants loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MachineKind {
    /// Works its own region and optionally one remote target region.
    Quarry {
        /// Region being mined, if not the machine's own.
        #[serde(default)]
        target: Option<RegionKey>,
    },
    /// Keeps a grid of regions around itself loaded and ticking.
    Stabilizer {
        /// Enabled cells as offsets from the machine's own region.
        #[serde(default)]
        enabled: BTreeSet<(i32, i32)>,
    },
    /// Has no upgrade slots and can never hold tickets.
    Relay,
}

impl MachineKind {
    /// Quarry working only its own region.
    pub fn quarry() -> Self {
        MachineKind::Quarry { target: None }
    }

    /// Stabilizer with only its own region enabled.
    pub fn stabilizer() -> Self {
        MachineKind::Stabilizer {
            enabled: BTreeSet::new(),
        }
    }

    /// Upgrade slots a machine of this kind is built with.
    pub fn supported_upgrades(&self) -> &'static [Upgrade] {
        match self {
            MachineKind::Quarry { .. } => &Upgrade::ALL,
            MachineKind::Stabilizer { .. } => &[Upgrade::Anchor],
            MachineKind::Relay => &[],
        }
    }

    /// Whether tickets are issued in ticking mode.
    pub fn ticking(&self) -> bool {
        matches!(self, MachineKind::Stabilizer { .. })
    }

    /// Regions wanted by a machine of this kind standing in `home`.
    pub fn desired_regions(&self, home: RegionKey, settings: &RetentionSettings) -> RegionSet {
        let mut desired = RegionSet::new();
        desired.insert(home);
        match self {
            MachineKind::Quarry {
                target: Some(target),
            } => {
                desired.insert(*target);
            }
            MachineKind::Quarry { target: None } | MachineKind::Relay => {}
            MachineKind::Stabilizer { enabled } => {
                let radius = settings.max_stabilizer_radius.max(0).unsigned_abs();
                desired.extend(
                    enabled
                        .iter()
                        .filter(|(dx, dz)| within_radius(*dx, *dz, radius))
                        .filter_map(|&(dx, dz)| home.offset(dx, dz)),
                );
            }
        }
        desired
    }
}

fn within_radius(dx: i32, dz: i32, radius: u32) -> bool {
    dx.unsigned_abs() <= radius && dz.unsigned_abs() <= radius
}

/// Identity and configuration shared by a machine's views.
#[derive(Debug, Clone)]
struct MachineState {
    kind: MachineKind,
    world: Option<WorldKey>,
    pos: BlockPos,
    settings: Arc<RetentionSettings>,
}

/// The machine as its retention component sees it.
pub struct MachineView<'a> {
    state: &'a MachineState,
    upgrades: &'a UpgradeComponent,
}

impl LoadRequestSource for MachineView<'_> {
    fn desired_regions(&self) -> RegionSet {
        self.state
            .kind
            .desired_regions(self.state.pos.region(), &self.state.settings)
    }

    fn is_eligible(&self) -> bool {
        self.state.settings.allow_chunk_loading
            && self.upgrades.supports_upgrades()
            && self.upgrades.is_installed(Upgrade::Anchor)
    }

    fn ticking_mode(&self) -> bool {
        self.state.kind.ticking()
    }

    fn current_world(&self) -> Option<WorldKey> {
        self.state.world.clone()
    }

    fn current_position(&self) -> BlockPos {
        self.state.pos
    }
}

/// Persisted form of a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSave {
    /// Block the machine occupies.
    pub pos: BlockPos,
    /// Machine kind and its settings.
    pub kind: MachineKind,
    /// Component fields.
    #[serde(default)]
    pub record: TileRecord,
}

/// A placed chunk-loading machine.
#[derive(Debug)]
pub struct Machine {
    state: MachineState,
    components: Components,
    dirty: bool,
}

impl Machine {
    /// Build a machine of `kind` at `pos`. It holds nothing until its first
    /// [`tick`](Self::tick).
    pub fn new(
        kind: MachineKind,
        world: Option<WorldKey>,
        pos: BlockPos,
        settings: Arc<RetentionSettings>,
        authority: SharedAuthority,
    ) -> Self {
        let upgrades = UpgradeComponent::new(kind.supported_upgrades().iter().copied());
        Self {
            state: MachineState {
                kind,
                world,
                pos,
                settings,
            },
            components: Components {
                upgrades,
                retention: ChunkRetention::new(authority),
            },
            dirty: false,
        }
    }

    /// Restore a machine from its save.
    pub fn load(
        save: &MachineSave,
        world: Option<WorldKey>,
        settings: Arc<RetentionSettings>,
        authority: SharedAuthority,
    ) -> Result<Self, ContentError> {
        let mut machine = Self::new(save.kind.clone(), world, save.pos, settings, authority);
        machine.components.read(&save.record)?;
        machine.components.retention.clear_dirty();
        Ok(machine)
    }

    /// Snapshot for persistence; acknowledges pending changes.
    pub fn save(&mut self) -> MachineSave {
        self.dirty = false;
        self.components.retention.clear_dirty();
        MachineSave {
            pos: self.state.pos,
            kind: self.state.kind.clone(),
            record: self.components.write(),
        }
    }

    /// Whether anything persisted changed since the last save.
    pub fn needs_save(&self) -> bool {
        self.dirty || self.components.retention.is_dirty()
    }

    /// Machine kind.
    pub fn kind(&self) -> &MachineKind {
        &self.state.kind
    }

    /// Current position.
    pub fn pos(&self) -> BlockPos {
        self.state.pos
    }

    /// Current world.
    pub fn world(&self) -> Option<&WorldKey> {
        self.state.world.as_ref()
    }

    /// Upgrade slots.
    pub fn upgrades(&self) -> &UpgradeComponent {
        &self.components.upgrades
    }

    /// Ticket bookkeeping.
    pub fn retention(&self) -> &ChunkRetention {
        &self.components.retention
    }

    /// Regions the machine would hold if eligible.
    pub fn desired_regions(&self) -> RegionSet {
        self.view().desired_regions()
    }

    /// Whether the machine may hold tickets right now.
    pub fn is_eligible(&self) -> bool {
        self.view().is_eligible()
    }

    fn view(&self) -> MachineView<'_> {
        MachineView {
            state: &self.state,
            upgrades: &self.components.upgrades,
        }
    }

    /// Per-step update.
    pub fn tick(&mut self) {
        let Components {
            upgrades,
            retention,
        } = &mut self.components;
        let view = MachineView {
            state: &self.state,
            upgrades,
        };
        retention.refresh(&view);
    }

    /// Install upgrades; returns how many went in.
    pub fn install_upgrade(&mut self, upgrade: Upgrade, amount: u8) -> Result<u8, UpgradeError> {
        let added = self.components.upgrades.install(upgrade, amount)?;
        if added > 0 {
            self.upgrades_changed(upgrade);
        }
        Ok(added)
    }

    /// Remove upgrades; returns how many came out.
    pub fn remove_upgrade(&mut self, upgrade: Upgrade, amount: u8) -> u8 {
        let removed = self.components.upgrades.remove(upgrade, amount);
        if removed > 0 {
            self.upgrades_changed(upgrade);
        }
        removed
    }

    /// Point a quarry at `target`. Returns `false` for other kinds.
    pub fn set_target(&mut self, target: Option<RegionKey>) -> bool {
        let MachineKind::Quarry { target: current } = &mut self.state.kind else {
            return false;
        };
        if *current != target {
            *current = target;
            self.desired_changed();
        }
        true
    }

    /// Flip one stabilizer cell. Returns the new state of the cell, or `None`
    /// when the machine is not a stabilizer or the cell lies outside the
    /// configured radius. The machine's own cell is always enabled.
    pub fn toggle_cell(&mut self, dx: i32, dz: i32) -> Option<bool> {
        let radius = self.state.settings.max_stabilizer_radius.max(0).unsigned_abs();
        let MachineKind::Stabilizer { enabled } = &mut self.state.kind else {
            return None;
        };
        if !within_radius(dx, dz, radius) {
            return None;
        }
        if (dx, dz) == (0, 0) {
            return Some(true);
        }
        let now_enabled = if enabled.remove(&(dx, dz)) {
            false
        } else {
            enabled.insert((dx, dz));
            true
        };
        debug!(pos = %self.state.pos, dx, dz, now_enabled, "stabilizer cell toggled");
        self.desired_changed();
        Some(now_enabled)
    }

    /// Relocate within the current world.
    pub fn move_to(&mut self, pos: BlockPos) {
        self.state.pos = pos;
    }

    /// Move to another world, or out of any world.
    pub fn set_world(&mut self, world: Option<WorldKey>) {
        self.state.world = world;
    }

    /// Give up every ticket held at the current anchor. The next tick
    /// registers again from wherever the machine stands by then.
    pub fn release_tickets(&mut self) {
        self.components.retention.on_removed();
    }

    /// The machine was broken or unloaded for good.
    pub fn on_removed(&mut self) {
        self.components.on_removed();
    }

    fn upgrades_changed(&mut self, upgrade: Upgrade) {
        self.dirty = true;
        if upgrade == Upgrade::Anchor {
            self.components.retention.notify_desired_set_changed();
        }
    }

    fn desired_changed(&mut self) {
        self.dirty = true;
        self.components.retention.notify_desired_set_changed();
    }
}

impl RetentionOwner for Machine {
    fn with_retention(&mut self, f: &mut dyn FnMut(&mut ChunkRetention, &dyn LoadRequestSource)) {
        let Components {
            upgrades,
            retention,
        } = &mut self.components;
        let view = MachineView {
            state: &self.state,
            upgrades,
        };
        f(retention, &view);
    }
}
