//! Owner whose wishes are set directly by the test.

use chunkhold_core::{BlockPos, RegionSet, WorldKey};
use chunkhold_retention::{ChunkRetention, LoadRequestSource, RetentionOwner, SharedAuthority};

/// Directly mutable [`LoadRequestSource`].
#[derive(Debug, Clone)]
pub struct ScriptedRequest {
    /// Current world; `None` models an owner that is not placed.
    pub world: Option<WorldKey>,
    /// Anchor position.
    pub pos: BlockPos,
    /// Regions the owner asks for.
    pub desired: RegionSet,
    /// Eligibility switch.
    pub eligible: bool,
    /// Ticket mode.
    pub ticking: bool,
}

impl LoadRequestSource for ScriptedRequest {
    fn desired_regions(&self) -> RegionSet {
        self.desired.clone()
    }

    fn is_eligible(&self) -> bool {
        self.eligible
    }

    fn ticking_mode(&self) -> bool {
        self.ticking
    }

    fn current_world(&self) -> Option<WorldKey> {
        self.world.clone()
    }

    fn current_position(&self) -> BlockPos {
        self.pos
    }
}

/// A retention component paired with a scripted request.
#[derive(Debug)]
pub struct ScriptedOwner {
    /// What the owner reports.
    pub request: ScriptedRequest,
    /// Component under test.
    pub retention: ChunkRetention,
}

impl ScriptedOwner {
    /// Eligible, non-ticking owner at `pos` in `world` wanting `desired`.
    pub fn new(authority: SharedAuthority, world: WorldKey, pos: BlockPos, desired: RegionSet) -> Self {
        Self {
            request: ScriptedRequest {
                world: Some(world),
                pos,
                desired,
                eligible: true,
                ticking: false,
            },
            retention: ChunkRetention::new(authority),
        }
    }

    /// One simulation step.
    pub fn refresh(&mut self) {
        self.retention.refresh(&self.request);
    }

    /// Replace the desired set and tell the component about it.
    pub fn change_desired(&mut self, desired: RegionSet) {
        self.request.desired = desired;
        self.retention.notify_desired_set_changed();
    }
}

impl RetentionOwner for ScriptedOwner {
    fn with_retention(&mut self, f: &mut dyn FnMut(&mut ChunkRetention, &dyn LoadRequestSource)) {
        f(&mut self.retention, &self.request);
    }
}
