#![warn(missing_docs)]
//! Test surfaces for chunk retention: a recording authority, scripted owners,
//! and golden-file snapshot plumbing.

mod authority;
mod micro_worldtest;
mod owner;
mod snapshot;

use chunkhold_core::{RegionKey, RegionSet};

pub use authority::*;
pub use micro_worldtest::*;
pub use owner::*;
pub use snapshot::*;

/// Build a region set from `(x, z)` pairs.
pub fn regions(keys: &[(i32, i32)]) -> RegionSet {
    keys.iter().map(|&(x, z)| RegionKey::new(x, z)).collect()
}

