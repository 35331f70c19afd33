//! One world's placed blocks.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chunkhold_content::{ContentError, Machine, MachineKind, MachineSave, RetentionSettings};
use chunkhold_core::{BlockPos, RegionSet, WorldKey};
use chunkhold_retention::{OwnerLookup, OwnerSlot, SharedAuthority};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Something occupying a block position.
#[derive(Debug)]
pub enum Block {
    /// A chunk-loading machine.
    Machine(Machine),
    /// A block that can never hold tickets.
    Inert,
}

/// Persisted form of a [`Block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum BlockSave {
    /// Machine and its component record.
    Machine(MachineSave),
    /// Inert block.
    Inert {
        /// Occupied position.
        pos: BlockPos,
    },
}

/// Rejected level edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    /// Target position already holds a block.
    #[error("{0} is already occupied")]
    Occupied(BlockPos),
    /// Nothing to act on.
    #[error("no block at {0}")]
    Vacant(BlockPos),
    /// The block there is not a machine.
    #[error("block at {0} is not a machine")]
    NotAMachine(BlockPos),
    /// No level is loaded for the world.
    #[error("world {0} is not loaded")]
    UnknownWorld(WorldKey),
}

/// Blocks of one world, keyed by position.
pub struct Level {
    world: WorldKey,
    blocks: BTreeMap<BlockPos, Block>,
    settings: Arc<RetentionSettings>,
    authority: SharedAuthority,
    dirty: bool,
}

impl Level {
    /// Empty level. It counts as unsaved until its first save.
    pub fn new(world: WorldKey, settings: Arc<RetentionSettings>, authority: SharedAuthority) -> Self {
        Self {
            world,
            blocks: BTreeMap::new(),
            settings,
            authority,
            dirty: true,
        }
    }

    /// World this level belongs to.
    pub fn world(&self) -> &WorldKey {
        &self.world
    }

    /// Number of occupied positions.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True when nothing is placed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Place a fresh machine.
    pub fn place_machine(&mut self, kind: MachineKind, pos: BlockPos) -> Result<&mut Machine, LevelError> {
        if self.blocks.contains_key(&pos) {
            return Err(LevelError::Occupied(pos));
        }
        let machine = Machine::new(
            kind,
            Some(self.world.clone()),
            pos,
            self.settings.clone(),
            self.authority.clone(),
        );
        self.insert_machine(machine)
    }

    /// Place a block that never loads chunks.
    pub fn place_inert(&mut self, pos: BlockPos) -> Result<(), LevelError> {
        if self.blocks.contains_key(&pos) {
            return Err(LevelError::Occupied(pos));
        }
        self.blocks.insert(pos, Block::Inert);
        self.dirty = true;
        Ok(())
    }

    /// Adopt a machine arriving from elsewhere at its current position.
    pub fn insert_machine(&mut self, mut machine: Machine) -> Result<&mut Machine, LevelError> {
        let pos = machine.pos();
        let Entry::Vacant(slot) = self.blocks.entry(pos) else {
            return Err(LevelError::Occupied(pos));
        };
        machine.set_world(Some(self.world.clone()));
        debug!(world = %self.world, %pos, kind = ?machine.kind(), "machine placed");
        self.dirty = true;
        match slot.insert(Block::Machine(machine)) {
            Block::Machine(machine) => Ok(machine),
            Block::Inert => Err(LevelError::NotAMachine(pos)),
        }
    }

    /// Take a machine out. Its tickets at `pos` are released right away so
    /// the position can be reused; it registers again on its first tick
    /// wherever it lands.
    pub fn take_machine(&mut self, pos: BlockPos) -> Result<Machine, LevelError> {
        match self.blocks.remove(&pos) {
            Some(Block::Machine(mut machine)) => {
                machine.release_tickets();
                self.dirty = true;
                Ok(machine)
            }
            Some(Block::Inert) => {
                self.blocks.insert(pos, Block::Inert);
                Err(LevelError::NotAMachine(pos))
            }
            None => Err(LevelError::Vacant(pos)),
        }
    }

    /// Shift a machine to another position in this world.
    pub fn move_machine(&mut self, from: BlockPos, to: BlockPos) -> Result<(), LevelError> {
        if self.blocks.contains_key(&to) {
            return Err(LevelError::Occupied(to));
        }
        let mut machine = self.take_machine(from)?;
        machine.move_to(to);
        debug!(world = %self.world, %from, %to, "machine moved");
        self.blocks.insert(to, Block::Machine(machine));
        Ok(())
    }

    /// Break whatever is at `pos`. Machines release their tickets first.
    pub fn remove(&mut self, pos: BlockPos) -> Result<Block, LevelError> {
        let mut block = self.blocks.remove(&pos).ok_or(LevelError::Vacant(pos))?;
        self.dirty = true;
        if let Block::Machine(machine) = &mut block {
            machine.on_removed();
            debug!(world = %self.world, %pos, "machine removed");
        }
        Ok(block)
    }

    /// Whether `pos` holds any block.
    pub fn is_occupied(&self, pos: BlockPos) -> bool {
        self.blocks.contains_key(&pos)
    }

    /// Machine at `pos`.
    pub fn machine(&self, pos: BlockPos) -> Option<&Machine> {
        match self.blocks.get(&pos) {
            Some(Block::Machine(machine)) => Some(machine),
            _ => None,
        }
    }

    /// Mutable machine at `pos`.
    pub fn machine_mut(&mut self, pos: BlockPos) -> Option<&mut Machine> {
        match self.blocks.get_mut(&pos) {
            Some(Block::Machine(machine)) => Some(machine),
            _ => None,
        }
    }

    /// Every machine in position order.
    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.blocks.values().filter_map(|block| match block {
            Block::Machine(machine) => Some(machine),
            Block::Inert => None,
        })
    }

    /// Refresh every machine.
    pub fn tick(&mut self) {
        for block in self.blocks.values_mut() {
            if let Block::Machine(machine) = block {
                machine.tick();
            }
        }
    }

    /// Union of every machine's retained set.
    pub fn retained_regions(&self) -> RegionSet {
        let mut retained = RegionSet::new();
        for machine in self.machines() {
            retained.extend(machine.retention().retained().iter().copied());
        }
        retained
    }

    /// Whether blocks were placed, moved or removed, or any machine changed,
    /// since the last save.
    pub fn needs_save(&self) -> bool {
        self.dirty || self.machines().any(Machine::needs_save)
    }

    /// Persisted blocks, in position order. Acknowledges pending changes.
    pub fn save(&mut self) -> Vec<BlockSave> {
        self.dirty = false;
        self.blocks
            .iter_mut()
            .map(|(pos, block)| match block {
                Block::Machine(machine) => BlockSave::Machine(machine.save()),
                Block::Inert => BlockSave::Inert { pos: *pos },
            })
            .collect()
    }

    /// Rebuild a level from saved blocks. No ticket calls are made.
    pub fn load(
        world: WorldKey,
        blocks: &[BlockSave],
        settings: Arc<RetentionSettings>,
        authority: SharedAuthority,
    ) -> Result<Self, ContentError> {
        let mut level = Self::new(world, settings, authority);
        for block in blocks {
            match block {
                BlockSave::Machine(save) => {
                    let machine = Machine::load(
                        save,
                        Some(level.world.clone()),
                        level.settings.clone(),
                        level.authority.clone(),
                    )?;
                    level.blocks.insert(save.pos, Block::Machine(machine));
                }
                BlockSave::Inert { pos } => {
                    level.blocks.insert(*pos, Block::Inert);
                }
            }
        }
        level.dirty = false;
        Ok(level)
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("world", &self.world)
            .field("blocks", &self.blocks)
            .field("settings", &self.settings)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl OwnerLookup for Level {
    fn owner_at(&mut self, pos: BlockPos) -> OwnerSlot<'_> {
        match self.blocks.get_mut(&pos) {
            Some(Block::Machine(machine)) => OwnerSlot::Owner(machine),
            Some(Block::Inert) => OwnerSlot::Incapable,
            None => OwnerSlot::Vacant,
        }
    }
}
