//! Tile component composition.
//!
//! A machine is a bag of named capability objects. Lifecycle events (removal,
//! saving, loading) fan out to every component in a fixed order so that the
//! persisted record is deterministic.

use chunkhold_retention::{ChunkRetention, RetentionRecord, TileRecord, CHUNK_SET_FIELD};

use crate::{ContentError, UpgradeComponent};

/// A capability attached to a machine.
pub trait TileComponent {
    /// Stable name; doubles as the record field the component owns.
    fn key(&self) -> &'static str;

    /// The machine left the world.
    fn on_removed(&mut self) {}

    /// Store persistent state into `record`.
    fn write(&self, record: &mut TileRecord);

    /// Replace persistent state from `record`.
    fn read(&mut self, record: &TileRecord) -> Result<(), ContentError>;
}

impl TileComponent for ChunkRetention {
    fn key(&self) -> &'static str {
        CHUNK_SET_FIELD
    }

    fn on_removed(&mut self) {
        ChunkRetention::on_removed(self);
    }

    fn write(&self, record: &mut TileRecord) {
        self.serialize().write_into(record);
    }

    fn read(&mut self, record: &TileRecord) -> Result<(), ContentError> {
        let stored = RetentionRecord::read_from(record)?;
        self.deserialize(&stored);
        Ok(())
    }
}

/// Components every chunk-loading machine carries.
#[derive(Debug)]
pub struct Components {
    /// Upgrade slots.
    pub upgrades: UpgradeComponent,
    /// Ticket bookkeeping.
    pub retention: ChunkRetention,
}

impl Components {
    /// Visit every component in record order.
    pub fn for_each(&self, mut f: impl FnMut(&dyn TileComponent)) {
        f(&self.upgrades);
        f(&self.retention);
    }

    /// Mutable counterpart of [`for_each`](Self::for_each).
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut dyn TileComponent)) {
        f(&mut self.upgrades);
        f(&mut self.retention);
    }

    /// Component keys in record order.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        self.for_each(|component| keys.push(component.key()));
        keys
    }

    pub(crate) fn on_removed(&mut self) {
        self.for_each_mut(|component| component.on_removed());
    }

    pub(crate) fn write(&self) -> TileRecord {
        let mut record = TileRecord::new();
        self.for_each(|component| component.write(&mut record));
        record
    }

    /// Upgrades are read first so eligibility is known before any ticket
    /// bookkeeping is restored.
    pub(crate) fn read(&mut self, record: &TileRecord) -> Result<(), ContentError> {
        let mut result = Ok(());
        self.for_each_mut(|component| {
            if result.is_ok() {
                result = component.read(record);
            }
        });
        result
    }
}
