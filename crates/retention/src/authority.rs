//! Contract with the host-side ticket authority.
//!
//! The authority is the only thing that actually keeps regions loaded. The
//! retention core never inspects its storage directly: it pins, unpins, and
//! (during validation) asks for a snapshot of every ticket in a world.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chunkhold_core::{BlockPos, RegionKey, RegionSet, WorldKey};

/// The (world, position) pair tickets are indexed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Anchor {
    /// World the tickets were issued in.
    pub world: WorldKey,
    /// Position of the owning machine.
    pub pos: BlockPos,
}

impl Anchor {
    /// Build an anchor from its parts.
    pub fn new(world: WorldKey, pos: BlockPos) -> Self {
        Self { world, pos }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.pos, self.world)
    }
}

/// Tickets held by one anchor, split by simulation mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketSet {
    /// Regions kept resident without being simulated.
    pub non_ticking: RegionSet,
    /// Regions kept fully simulated.
    pub ticking: RegionSet,
}

impl TicketSet {
    /// Regions held in the given mode.
    pub fn mode(&self, ticking: bool) -> &RegionSet {
        if ticking {
            &self.ticking
        } else {
            &self.non_ticking
        }
    }

    fn mode_mut(&mut self, ticking: bool) -> &mut RegionSet {
        if ticking {
            &mut self.ticking
        } else {
            &mut self.non_ticking
        }
    }

    /// Record a ticket. Returns `false` if it was already present.
    pub fn insert(&mut self, region: RegionKey, ticking: bool) -> bool {
        self.mode_mut(ticking).insert(region)
    }

    /// Drop a ticket. Returns `false` if it was not present.
    pub fn remove(&mut self, region: &RegionKey, ticking: bool) -> bool {
        self.mode_mut(ticking).remove(region)
    }

    /// Every region pinned in either mode.
    pub fn all(&self) -> RegionSet {
        self.non_ticking.union(&self.ticking)
    }

    /// Total ticket count across both modes.
    pub fn len(&self) -> usize {
        self.non_ticking.len() + self.ticking.len()
    }

    /// True when neither mode holds a ticket.
    pub fn is_empty(&self) -> bool {
        self.non_ticking.is_empty() && self.ticking.is_empty()
    }
}

/// Snapshot of every anchor's tickets in one world, ordered by position.
pub type TicketIndex = BTreeMap<BlockPos, TicketSet>;

/// Host system that pins regions on behalf of anchors.
///
/// Implementations are shared process-wide and use interior mutability; calls
/// are synchronous and report success as a plain boolean.
pub trait TicketAuthority {
    /// Add (`pinned = true`) or remove a ticket for `(region_x, region_z)` under
    /// `anchor_pos` in `world`. Returns `false` when the authority refused or the
    /// ticket was already in the requested state.
    fn set_pinned(
        &self,
        world: &WorldKey,
        anchor_pos: BlockPos,
        region_x: i32,
        region_z: i32,
        pinned: bool,
        ticking: bool,
    ) -> bool;

    /// All tickets currently recorded for `world`.
    fn enumerate_tickets(&self, world: &WorldKey) -> TicketIndex;
}

/// Handle injected into every retention component.
pub type SharedAuthority = Arc<dyn TicketAuthority + Send + Sync>;

/// Issue a single pin/unpin for `anchor`, logging refusals.
pub(crate) fn set_pinned(
    authority: &dyn TicketAuthority,
    anchor: &Anchor,
    region: RegionKey,
    pinned: bool,
    ticking: bool,
) -> bool {
    let ok = authority.set_pinned(
        &anchor.world,
        anchor.pos,
        region.x,
        region.z,
        pinned,
        ticking,
    );
    if !ok {
        if pinned {
            tracing::warn!(%anchor, %region, ticking, "failed to pin region");
        } else {
            tracing::warn!(%anchor, %region, ticking, "failed to release region ticket");
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_set_tracks_modes_separately() {
        let mut set = TicketSet::default();
        assert!(set.is_empty());
        assert!(set.insert(RegionKey::new(0, 0), false));
        assert!(!set.insert(RegionKey::new(0, 0), false));
        assert!(set.insert(RegionKey::new(0, 0), true));
        assert_eq!(set.len(), 2);
        assert_eq!(set.all().len(), 1);
        assert!(set.remove(&RegionKey::new(0, 0), true));
        assert!(!set.remove(&RegionKey::new(0, 0), true));
        assert!(set.mode(true).is_empty());
        assert_eq!(set.mode(false).len(), 1);
    }
}
