//! World-activation sweep that reconciles the authority's tickets with the
//! owners that claim them.
//!
//! Runs once per world before any per-step refresh. Tickets at positions
//! without a capable owner are orphans and get released; ineligible owners
//! lose everything; capable owners are reconciled against their current
//! desired set with the authority's records taking precedence over the
//! owner's persisted set.

use chunkhold_core::{BlockPos, WorldKey};
use tracing::{debug, info, warn};

use crate::authority::set_pinned;
use crate::{
    reconcile, Anchor, ChunkRetention, LoadRequestSource, OwnerLookup, OwnerSlot, TicketAuthority,
    TicketSet,
};

/// Tally of what a validation sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Anchors with at least one ticket.
    pub anchors: usize,
    /// Anchors with no capable owner; all tickets released.
    pub orphaned: usize,
    /// Owners that could no longer hold tickets; all tickets released.
    pub released: usize,
    /// Owners whose tickets needed changes.
    pub repaired: usize,
    /// Owners whose tickets already matched.
    pub unchanged: usize,
    /// Pin/unpin calls the authority refused.
    pub failed_calls: usize,
}

/// Validate every anchor the authority knows about in `world`.
pub fn validate_world(
    world: &WorldKey,
    authority: &dyn TicketAuthority,
    owners: &mut dyn OwnerLookup,
) -> ValidationReport {
    let index = authority.enumerate_tickets(world);
    debug!(%world, anchors = index.len(), "validating chunk tickets");

    let mut report = ValidationReport::default();
    for (pos, tickets) in index {
        if tickets.is_empty() {
            continue;
        }
        report.anchors += 1;
        let anchor = Anchor::new(world.clone(), pos);
        validate_anchor(&anchor, &tickets, authority, owners, &mut report);
    }

    if report.orphaned + report.released + report.repaired > 0 {
        info!(
            %world,
            anchors = report.anchors,
            orphaned = report.orphaned,
            released = report.released,
            repaired = report.repaired,
            "chunk ticket validation corrected state"
        );
    } else {
        debug!(%world, anchors = report.anchors, "chunk tickets validated");
    }
    report
}

fn validate_anchor(
    anchor: &Anchor,
    tickets: &TicketSet,
    authority: &dyn TicketAuthority,
    owners: &mut dyn OwnerLookup,
    report: &mut ValidationReport,
) {
    let owner = match owners.owner_at(anchor.pos) {
        OwnerSlot::Owner(owner) => owner,
        OwnerSlot::Vacant | OwnerSlot::Incapable => {
            warn!(
                %anchor,
                tickets = tickets.len(),
                "no valid chunk loader at anchor, removing its tickets"
            );
            report.failed_calls += release_all(authority, anchor, tickets);
            report.orphaned += 1;
            return;
        }
    };

    owner.with_retention(&mut |retention: &mut ChunkRetention, source: &dyn LoadRequestSource| {
        validate_owner(anchor, tickets, authority, retention, source, report)
    });
}

fn validate_owner(
    anchor: &Anchor,
    tickets: &TicketSet,
    authority: &dyn TicketAuthority,
    retention: &mut ChunkRetention,
    source: &dyn LoadRequestSource,
    report: &mut ValidationReport,
) {
    if !source.is_eligible() {
        info!(
            %anchor,
            tickets = tickets.len(),
            "chunk loader cannot operate, removing its tickets"
        );
        report.failed_calls += release_all(authority, anchor, tickets);
        retention.forget();
        report.released += 1;
        return;
    }

    let desired = source.desired_regions();
    if desired.is_empty() {
        warn!(
            %anchor,
            tickets = tickets.len(),
            "chunk loader no longer wants any regions, removing its tickets"
        );
        report.failed_calls += release_all(authority, anchor, tickets);
        retention.forget();
        report.released += 1;
        return;
    }

    let ticking = source.ticking_mode();
    let plan = reconcile(tickets, retention.retained(), &desired, ticking);
    if plan.local_mismatch {
        debug!(%anchor, "recorded chunk set disagrees with authority, correcting");
    }

    for op in &plan.unpin {
        if !set_pinned(authority, anchor, op.region, false, op.ticking) {
            report.failed_calls += 1;
        }
    }
    for op in &plan.pin {
        if !set_pinned(authority, anchor, op.region, true, op.ticking) {
            report.failed_calls += 1;
        }
    }

    let changed = plan.local_mismatch || !plan.is_noop();
    if plan.is_noop() {
        debug!(%anchor, "tickets validated");
        report.unchanged += 1;
    } else {
        info!(
            %anchor,
            removed = plan.unpin.len(),
            added = plan.pin.len(),
            "corrected chunk tickets during validation"
        );
        report.repaired += 1;
    }
    retention.adopt_validated(anchor.clone(), ticking, plan.retained, changed);
}

/// Release every ticket at `anchor`. Returns the number of refused calls.
fn release_all(authority: &dyn TicketAuthority, anchor: &Anchor, tickets: &TicketSet) -> usize {
    let mut failed = 0;
    for ticking in [false, true] {
        for &region in tickets.mode(ticking) {
            if !set_pinned(authority, anchor, region, false, ticking) {
                failed += 1;
            }
        }
    }
    failed
}

/// Convenience for hosts that keep owners in a plain position map.
impl<T> OwnerLookup for std::collections::BTreeMap<BlockPos, T>
where
    T: crate::RetentionOwner,
{
    fn owner_at(&mut self, pos: BlockPos) -> OwnerSlot<'_> {
        match self.get_mut(&pos) {
            Some(owner) => OwnerSlot::Owner(owner),
            None => OwnerSlot::Vacant,
        }
    }
}
