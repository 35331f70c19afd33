#![warn(missing_docs)]
//! Core primitives shared across the workspace.

mod pos;
#[allow(missing_docs)]
pub mod region;
mod world_key;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use pos::BlockPos;
pub use region::{RegionKey, RegionSet, REGION_WIDTH};
pub use world_key::{WorldKey, WorldKeyError, DEFAULT_NAMESPACE};

/// Fixed tick type (20 TPS => 50 ms per tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any deterministic timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}
