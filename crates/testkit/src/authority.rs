//! In-memory ticket authority that records every call.
//!
//! Behaves like a strict host ticket store: pinning a ticket that already
//! exists or releasing one that does not returns `false`. Individual regions
//! (or every call) can be made to fail to exercise the best-effort paths.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chunkhold_core::{BlockPos, RegionKey, RegionSet, WorldKey};
use chunkhold_retention::{SharedAuthority, TicketAuthority, TicketIndex, TicketSet};
use serde::Serialize;

/// One `set_pinned` call as the authority saw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorityCall {
    /// World the call targeted.
    pub world: WorldKey,
    /// Anchor position.
    pub anchor: BlockPos,
    /// Region pinned or released.
    pub region: RegionKey,
    /// `true` to pin, `false` to release.
    pub pinned: bool,
    /// Ticket mode.
    pub ticking: bool,
    /// Whether the authority reported success.
    pub accepted: bool,
}

impl AuthorityCall {
    /// Expected successful pin.
    pub fn pin(world: &WorldKey, anchor: BlockPos, x: i32, z: i32, ticking: bool) -> Self {
        Self {
            world: world.clone(),
            anchor,
            region: RegionKey::new(x, z),
            pinned: true,
            ticking,
            accepted: true,
        }
    }

    /// Expected successful release.
    pub fn unpin(world: &WorldKey, anchor: BlockPos, x: i32, z: i32, ticking: bool) -> Self {
        Self {
            pinned: false,
            ..Self::pin(world, anchor, x, z, ticking)
        }
    }

    /// Same call, reported as refused.
    pub fn refused(self) -> Self {
        Self {
            accepted: false,
            ..self
        }
    }
}

impl fmt::Display for AuthorityCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}{}{}",
            if self.pinned { "pin" } else { "unpin" },
            self.region,
            self.anchor,
            self.world,
            if self.ticking { " ticking" } else { "" },
            if self.accepted { "" } else { " REFUSED" },
        )
    }
}

#[derive(Default)]
struct State {
    tickets: BTreeMap<WorldKey, TicketIndex>,
    calls: Vec<AuthorityCall>,
    refused_regions: BTreeSet<RegionKey>,
    refuse_all: bool,
}

/// Recording, failure-injectable [`TicketAuthority`].
#[derive(Default)]
pub struct RecordingAuthority {
    state: Mutex<State>,
}

impl RecordingAuthority {
    /// Fresh authority wrapped for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Coerce to the handle components take.
    pub fn handle(self: &Arc<Self>) -> SharedAuthority {
        self.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a ticket directly, as if left over from a previous session.
    /// Not recorded as a call.
    pub fn seed(&self, world: &WorldKey, anchor: BlockPos, regions: &RegionSet, ticking: bool) {
        let mut state = self.lock();
        let set = state
            .tickets
            .entry(world.clone())
            .or_default()
            .entry(anchor)
            .or_default();
        for &region in regions {
            set.insert(region, ticking);
        }
    }

    /// Make every call touching `region` fail until [`allow_region`](Self::allow_region).
    pub fn refuse_region(&self, region: RegionKey) {
        self.lock().refused_regions.insert(region);
    }

    /// Undo [`refuse_region`](Self::refuse_region).
    pub fn allow_region(&self, region: RegionKey) {
        self.lock().refused_regions.remove(&region);
    }

    /// Make every call fail (or succeed again).
    pub fn refuse_all(&self, refuse: bool) {
        self.lock().refuse_all = refuse;
    }

    /// Every call since creation or the last [`take_calls`](Self::take_calls).
    pub fn calls(&self) -> Vec<AuthorityCall> {
        self.lock().calls.clone()
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<AuthorityCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Tickets currently held for one anchor.
    pub fn tickets_at(&self, world: &WorldKey, anchor: BlockPos) -> TicketSet {
        self.lock()
            .tickets
            .get(world)
            .and_then(|index| index.get(&anchor))
            .cloned()
            .unwrap_or_default()
    }

    /// Total tickets across every world and anchor.
    pub fn ticket_count(&self) -> usize {
        self.lock()
            .tickets
            .values()
            .flat_map(|index| index.values())
            .map(TicketSet::len)
            .sum()
    }
}

impl TicketAuthority for RecordingAuthority {
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
        let mut state = self.lock();
        let refused = state.refuse_all || state.refused_regions.contains(&region);

        let accepted = if refused {
            false
        } else {
            let index = state.tickets.entry(world.clone()).or_default();
            let set = index.entry(anchor_pos).or_default();
            let changed = if pinned {
                set.insert(region, ticking)
            } else {
                set.remove(&region, ticking)
            };
            if set.is_empty() {
                index.remove(&anchor_pos);
            }
            changed
        };

        state.calls.push(AuthorityCall {
            world: world.clone(),
            anchor: anchor_pos,
            region,
            pinned,
            ticking,
            accepted,
        });
        accepted
    }

    fn enumerate_tickets(&self, world: &WorldKey) -> TicketIndex {
        self.lock().tickets.get(world).cloned().unwrap_or_default()
    }
}
