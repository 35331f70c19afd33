//! What the retention core needs from the machine that owns it.

use chunkhold_core::{BlockPos, RegionSet, WorldKey};

use crate::ChunkRetention;

/// The owning entity's view of what it wants loaded.
///
/// Queried fresh on every refresh; nothing here is cached by the component.
pub trait LoadRequestSource {
    /// Regions the owner wants retained right now.
    fn desired_regions(&self) -> RegionSet;

    /// Whether the owner may request retention at all.
    fn is_eligible(&self) -> bool;

    /// Whether requested regions should be fully simulated.
    fn ticking_mode(&self) -> bool {
        false
    }

    /// World the owner is in, or `None` while it is not placed in one.
    fn current_world(&self) -> Option<WorldKey>;

    /// Position the owner's tickets are anchored at.
    fn current_position(&self) -> BlockPos;
}

/// Owner that carries a [`ChunkRetention`] component.
///
/// The owner hands its component and a view of its live state to `f`
/// together, so callers can drive the component without the owner having to
/// expose how its state is laid out.
pub trait RetentionOwner {
    /// Run `f` with the owner's component and request source.
    fn with_retention(&mut self, f: &mut dyn FnMut(&mut ChunkRetention, &dyn LoadRequestSource));
}

/// Result of looking up the occupant of an anchor position.
pub enum OwnerSlot<'a> {
    /// Nothing is at the position.
    Vacant,
    /// Something is there but it cannot hold tickets.
    Incapable,
    /// A retention-capable owner.
    Owner(&'a mut dyn RetentionOwner),
}

/// World-side index of owners, used by validation to find who an anchor belongs to.
pub trait OwnerLookup {
    /// Occupant of `pos` in the world being validated.
    fn owner_at(&mut self, pos: BlockPos) -> OwnerSlot<'_>;
}
