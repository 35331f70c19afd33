//! Process-wide ticket registry.
//!
//! The registry is the authority that actually keeps regions loaded. It is
//! persisted in its own file, separate from the levels, so a crash between
//! the two writes leaves them disagreeing. World activation repairs that.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chunkhold_core::{BlockPos, RegionKey, RegionSet, WorldKey};
use chunkhold_retention::{SharedAuthority, TicketAuthority, TicketIndex, TicketSet};
use serde::{Deserialize, Serialize};
use tracing::{info, trace};

/// Tickets of one anchor as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketEntry {
    /// World the tickets belong to.
    pub world: WorldKey,
    /// Owning position.
    pub anchor: BlockPos,
    /// Packed regions held without simulation.
    #[serde(default)]
    pub non_ticking: Vec<i64>,
    /// Packed regions held fully simulated.
    #[serde(default)]
    pub ticking: Vec<i64>,
}

/// On-disk registry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySave {
    /// Wall-clock time of the write.
    pub saved_at: DateTime<Utc>,
    /// Every non-empty anchor.
    pub entries: Vec<TicketEntry>,
}

/// In-memory ticket authority shared by every level.
#[derive(Debug, Default)]
pub struct TicketRegistry {
    tickets: Mutex<BTreeMap<WorldKey, TicketIndex>>,
}

impl TicketRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerce to the handle retention components take.
    pub fn handle(self: &Arc<Self>) -> SharedAuthority {
        self.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<WorldKey, TicketIndex>> {
        self.tickets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tickets held under one anchor.
    pub fn tickets_at(&self, world: &WorldKey, anchor: BlockPos) -> TicketSet {
        self.lock()
            .get(world)
            .and_then(|index| index.get(&anchor))
            .cloned()
            .unwrap_or_default()
    }

    /// Total tickets across all worlds.
    pub fn ticket_count(&self) -> usize {
        self.lock()
            .values()
            .flat_map(|index| index.values())
            .map(TicketSet::len)
            .sum()
    }

    /// Flatten into the on-disk form.
    pub fn to_save(&self) -> RegistrySave {
        let tickets = self.lock();
        let entries = tickets
            .iter()
            .flat_map(|(world, index)| {
                index.iter().map(move |(anchor, set)| TicketEntry {
                    world: world.clone(),
                    anchor: *anchor,
                    non_ticking: set.non_ticking.to_packed(),
                    ticking: set.ticking.to_packed(),
                })
            })
            .collect();
        RegistrySave {
            saved_at: Utc::now(),
            entries,
        }
    }

    /// Rebuild from the on-disk form. Empty entries are skipped.
    pub fn from_save(save: &RegistrySave) -> Self {
        let mut tickets: BTreeMap<WorldKey, TicketIndex> = BTreeMap::new();
        for entry in &save.entries {
            let set = TicketSet {
                non_ticking: RegionSet::from_packed(&entry.non_ticking),
                ticking: RegionSet::from_packed(&entry.ticking),
            };
            if set.is_empty() {
                continue;
            }
            tickets
                .entry(entry.world.clone())
                .or_default()
                .insert(entry.anchor, set);
        }
        Self {
            tickets: Mutex::new(tickets),
        }
    }

    /// Write the registry file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let save = self.to_save();
        let json =
            serde_json::to_string_pretty(&save).context("Failed to serialize ticket registry")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write ticket registry {}", path.display()))?;
        info!(
            path = %path.display(),
            anchors = save.entries.len(),
            "saved ticket registry"
        );
        Ok(())
    }

    /// Read the registry file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ticket registry {}", path.display()))?;
        let save: RegistrySave =
            serde_json::from_str(&json).context("Failed to deserialize ticket registry")?;
        let registry = Self::from_save(&save);
        info!(
            path = %path.display(),
            tickets = registry.ticket_count(),
            saved_at = %save.saved_at,
            "loaded ticket registry"
        );
        Ok(registry)
    }
}

impl TicketAuthority for TicketRegistry {
    fn set_pinned(
        &self,
        world: &WorldKey,
        anchor_pos: BlockPos,
        region_x: i32,
        region_z: i32,
        pinned: bool,
        ticking: bool,
    ) -> bool {
        let region = RegionKey::new(region_x, region_z);
        let mut tickets = self.lock();
        let changed = if pinned {
            tickets
                .entry(world.clone())
                .or_default()
                .entry(anchor_pos)
                .or_default()
                .insert(region, ticking)
        } else {
            let Some(index) = tickets.get_mut(world) else {
                return false;
            };
            let Some(set) = index.get_mut(&anchor_pos) else {
                return false;
            };
            let removed = set.remove(&region, ticking);
            if set.is_empty() {
                index.remove(&anchor_pos);
            }
            if index.is_empty() {
                tickets.remove(world);
            }
            removed
        };
        trace!(%world, anchor = %anchor_pos, %region, pinned, ticking, changed, "ticket update");
        changed
    }

    fn enumerate_tickets(&self, world: &WorldKey) -> TicketIndex {
        self.lock().get(world).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> WorldKey {
        WorldKey::overworld()
    }

    #[test]
    fn pin_twice_and_unpin_missing_are_refused() {
        let registry = TicketRegistry::new();
        let pos = BlockPos::new(0, 64, 0);
        assert!(registry.set_pinned(&world(), pos, 1, 2, true, false));
        assert!(!registry.set_pinned(&world(), pos, 1, 2, true, false));
        assert!(!registry.set_pinned(&world(), pos, 1, 2, false, true));
        assert!(registry.set_pinned(&world(), pos, 1, 2, false, false));
        assert!(!registry.set_pinned(&world(), pos, 1, 2, false, false));
        assert!(registry.enumerate_tickets(&world()).is_empty());
    }

    #[test]
    fn modes_are_tracked_separately() {
        let registry = TicketRegistry::new();
        let pos = BlockPos::new(0, 64, 0);
        assert!(registry.set_pinned(&world(), pos, 0, 0, true, false));
        assert!(registry.set_pinned(&world(), pos, 0, 0, true, true));
        let set = registry.tickets_at(&world(), pos);
        assert_eq!(set.len(), 2);
        assert_eq!(set.ticking.len(), 1);
        assert_eq!(set.non_ticking.len(), 1);
    }

    #[test]
    fn save_roundtrip_keeps_every_ticket() {
        let registry = TicketRegistry::new();
        let nether = WorldKey::parse("chunkhold:nether").unwrap();
        registry.set_pinned(&world(), BlockPos::new(0, 64, 0), -3, 7, true, false);
        registry.set_pinned(&nether, BlockPos::new(5, 10, 5), 0, 0, true, true);

        let json = serde_json::to_string(&registry.to_save()).unwrap();
        let restored = TicketRegistry::from_save(&serde_json::from_str(&json).unwrap());
        assert_eq!(restored.enumerate_tickets(&world()), registry.enumerate_tickets(&world()));
        assert_eq!(restored.enumerate_tickets(&nether), registry.enumerate_tickets(&nether));
        assert_eq!(restored.ticket_count(), 2);
    }
}
