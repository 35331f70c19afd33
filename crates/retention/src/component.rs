//! Per-owner chunk retention component.
//!
//! Keeps the set of regions this owner believes are pinned and drives the
//! authority toward the owner's desired set with the fewest calls possible.
//! Authority refusals are logged and otherwise ignored: local state follows
//! intent, and world validation repairs whatever drifted.

use chunkhold_core::{RegionKey, RegionSet};
use tracing::{debug, trace};

use crate::authority::set_pinned;
use crate::{Anchor, LoadRequestSource, RetentionRecord, SharedAuthority};

/// Where (and in which mode) the current tickets were issued.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    anchor: Anchor,
    ticking: bool,
}

/// Retention state for a single owner.
pub struct ChunkRetention {
    authority: SharedAuthority,
    retained: RegionSet,
    registration: Option<Registration>,
    desired_changed: bool,
    dirty: bool,
}

impl ChunkRetention {
    /// Create an unregistered component issuing calls to `authority`.
    pub fn new(authority: SharedAuthority) -> Self {
        Self {
            authority,
            retained: RegionSet::new(),
            registration: None,
            desired_changed: false,
            dirty: false,
        }
    }

    /// Regions this component believes are pinned.
    pub fn retained(&self) -> &RegionSet {
        &self.retained
    }

    /// Whether tickets are currently registered under an anchor.
    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Anchor of the current registration.
    pub fn anchor(&self) -> Option<&Anchor> {
        self.registration.as_ref().map(|reg| &reg.anchor)
    }

    /// Mode the current tickets were pinned with.
    pub fn registered_ticking(&self) -> Option<bool> {
        self.registration.as_ref().map(|reg| reg.ticking)
    }

    /// Whether the retained set changed since the owner last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledge a save.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Make the next [`refresh`](Self::refresh) diff against the desired set
    /// even if eligibility and anchor are unchanged.
    pub fn notify_desired_set_changed(&mut self) {
        self.desired_changed = true;
    }

    /// Per-step update. Does nothing while the owner has no world.
    pub fn refresh(&mut self, source: &dyn LoadRequestSource) {
        let Some(world) = source.current_world() else {
            return;
        };
        let anchor = Anchor::new(world, source.current_position());
        let desired_changed = std::mem::take(&mut self.desired_changed);
        self.refresh_at(source, anchor, desired_changed);
    }

    fn refresh_at(&mut self, source: &dyn LoadRequestSource, anchor: Anchor, desired_changed: bool) {
        let eligible = source.is_eligible();
        trace!(%anchor, eligible, desired_changed, "refreshing chunk tickets");

        let Some(current) = self.registration.clone() else {
            if eligible {
                self.register(source, anchor);
            }
            return;
        };

        if current.anchor != anchor {
            self.release(&current);
            if eligible {
                self.register(source, anchor);
            }
        } else if !eligible {
            self.release(&current);
        } else if desired_changed {
            if self.retained.is_empty() {
                self.register(source, anchor);
                return;
            }
            let desired = source.desired_regions();
            if desired.is_empty() {
                self.release(&current);
            } else {
                self.apply_diff(&current, &desired);
            }
        }
    }

    /// Release every retained region, regardless of eligibility. Safe to call
    /// more than once.
    pub fn on_removed(&mut self) {
        self.desired_changed = false;
        if let Some(current) = self.registration.clone() {
            self.release(&current);
        }
    }

    /// Persisted form of the retained set.
    pub fn serialize(&self) -> RetentionRecord {
        RetentionRecord::from_regions(&self.retained)
    }

    /// Restore the retained set. Registration state is not persisted; the next
    /// refresh (or world validation) re-derives it.
    pub fn deserialize(&mut self, record: &RetentionRecord) {
        if !self.retained.is_empty() {
            match self.registration.clone() {
                Some(current) => self.release(&current),
                None => self.retained.clear(),
            }
        }
        self.retained = record.regions();
    }

    fn register(&mut self, source: &dyn LoadRequestSource, anchor: Anchor) {
        let ticking = source.ticking_mode();
        let desired = source.desired_regions();
        debug!(%anchor, tickets = desired.len(), ticking, "adding chunk tickets");
        for &region in &desired {
            set_pinned(&*self.authority, &anchor, region, true, ticking);
        }
        if self.retained != desired {
            self.retained = desired;
            self.dirty = true;
        }
        self.registration = Some(Registration { anchor, ticking });
    }

    fn release(&mut self, current: &Registration) {
        debug!(
            anchor = %current.anchor,
            tickets = self.retained.len(),
            "removing chunk tickets"
        );
        if !self.retained.is_empty() {
            for &region in &self.retained {
                set_pinned(
                    &*self.authority,
                    &current.anchor,
                    region,
                    false,
                    current.ticking,
                );
            }
            self.retained.clear();
            self.dirty = true;
        }
        self.registration = None;
    }

    fn apply_diff(&mut self, current: &Registration, desired: &RegionSet) {
        let stale: Vec<RegionKey> = self.retained.difference(desired).collect();
        let fresh: Vec<RegionKey> = desired.difference(&self.retained).collect();

        for region in &stale {
            set_pinned(
                &*self.authority,
                &current.anchor,
                *region,
                false,
                current.ticking,
            );
            self.retained.remove(region);
        }
        for region in &fresh {
            set_pinned(
                &*self.authority,
                &current.anchor,
                *region,
                true,
                current.ticking,
            );
            self.retained.insert(*region);
        }

        if !stale.is_empty() || !fresh.is_empty() {
            self.dirty = true;
        }
        debug!(
            anchor = %current.anchor,
            removed = stale.len(),
            added = fresh.len(),
            "adjusted chunk tickets"
        );
    }

    /// Adopt the outcome of world validation: registered at `anchor` in mode
    /// `ticking`, holding exactly `retained`.
    pub(crate) fn adopt_validated(
        &mut self,
        anchor: Anchor,
        ticking: bool,
        retained: RegionSet,
        changed: bool,
    ) {
        self.retained = retained;
        self.registration = Some(Registration { anchor, ticking });
        if changed {
            self.dirty = true;
        }
    }

    /// Forget all bookkeeping after validation released this owner's tickets.
    pub(crate) fn forget(&mut self) {
        self.retained.clear();
        self.registration = None;
        self.dirty = true;
    }
}

impl std::fmt::Debug for ChunkRetention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRetention")
            .field("retained", &self.retained)
            .field("registration", &self.registration)
            .field("desired_changed", &self.desired_changed)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
