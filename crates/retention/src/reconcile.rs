//! Conflict resolution between authority records, local bookkeeping, and
//! the owner's current wishes.
//!
//! The authority's tickets win over the component's persisted set: whatever
//! the authority reports is what is actually pinned, so the plan is computed
//! against it and the local set is replaced wholesale.

use chunkhold_core::{RegionKey, RegionSet};

use crate::TicketSet;

/// One pin or unpin call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketOp {
    /// Region to pin or release.
    pub region: RegionKey,
    /// Simulation mode of the ticket.
    pub ticking: bool,
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Retained set once every op has been issued.
    pub retained: RegionSet,
    /// Tickets to release, issued before any pin.
    pub unpin: Vec<TicketOp>,
    /// Tickets to add.
    pub pin: Vec<TicketOp>,
    /// Local bookkeeping disagreed with the authority.
    pub local_mismatch: bool,
}

impl Reconciliation {
    /// True when the authority already matches the desired state.
    pub fn is_noop(&self) -> bool {
        self.unpin.is_empty() && self.pin.is_empty()
    }
}

/// Plan the calls that take `authoritative` to `desired` in mode `ticking`.
///
/// Tickets held in the other mode are released and re-pinned in the right
/// one, even when their region is still desired.
pub fn reconcile(
    authoritative: &TicketSet,
    local: &RegionSet,
    desired: &RegionSet,
    ticking: bool,
) -> Reconciliation {
    let local_mismatch = authoritative.all() != *local;
    let matching = authoritative.mode(ticking);

    let mut unpin: Vec<TicketOp> = authoritative
        .mode(!ticking)
        .iter()
        .map(|&region| TicketOp {
            region,
            ticking: !ticking,
        })
        .collect();
    unpin.extend(
        matching
            .difference(desired)
            .map(|region| TicketOp { region, ticking }),
    );

    let pin = desired
        .difference(matching)
        .map(|region| TicketOp { region, ticking })
        .collect();

    Reconciliation {
        retained: desired.clone(),
        unpin,
        pin,
        local_mismatch,
    }
}
