//! Region (chunk column) coordinates and sets of them.

use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

/// Width of a region in blocks along X and Z.
pub const REGION_WIDTH: i32 = 16;

/// Chunk coordinate (X,Z) in region space.
/// Implements Ord for deterministic iteration in BTreeSet (sorts by x, then z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    pub x: i32,
    pub z: i32,
}

impl RegionKey {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Pack into a single integer: low 32 bits hold `x`, high 32 bits hold `z`.
    pub const fn pack(self) -> i64 {
        ((self.x as u32 as u64) | ((self.z as u32 as u64) << 32)) as i64
    }

    /// Inverse of [`RegionKey::pack`]. Every `i64` decodes to exactly one key.
    pub const fn unpack(packed: i64) -> Self {
        let bits = packed as u64;
        Self {
            x: bits as u32 as i32,
            z: (bits >> 32) as u32 as i32,
        }
    }

    /// Region containing the given block column.
    pub const fn containing(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(REGION_WIDTH),
            z: block_z.div_euclid(REGION_WIDTH),
        }
    }

    /// Offset by a number of regions along each axis, or `None` if either
    /// coordinate leaves the `i32` range.
    pub const fn offset(self, dx: i32, dz: i32) -> Option<Self> {
        match (self.x.checked_add(dx), self.z.checked_add(dz)) {
            (Some(x), Some(z)) => Some(Self { x, z }),
            _ => None,
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Ordered, duplicate-free set of regions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionSet {
    regions: BTreeSet<RegionKey>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a set from packed integers (duplicates collapse).
    pub fn from_packed(packed: &[i64]) -> Self {
        packed.iter().copied().map(RegionKey::unpack).collect()
    }

    /// Encode every member with [`RegionKey::pack`], in iteration order.
    pub fn to_packed(&self) -> Vec<i64> {
        self.regions.iter().map(|key| key.pack()).collect()
    }

    /// Returns `true` if the region was not already present.
    pub fn insert(&mut self, key: RegionKey) -> bool {
        self.regions.insert(key)
    }

    /// Returns `true` if the region was present.
    pub fn remove(&mut self, key: &RegionKey) -> bool {
        self.regions.remove(key)
    }

    pub fn contains(&self, key: &RegionKey) -> bool {
        self.regions.contains(key)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn iter(&self) -> btree_set::Iter<'_, RegionKey> {
        self.regions.iter()
    }

    /// Regions in `self` that are not in `other`.
    pub fn difference<'a>(&'a self, other: &'a RegionSet) -> impl Iterator<Item = RegionKey> + 'a {
        self.regions.difference(&other.regions).copied()
    }

    /// Regions present in either set.
    pub fn union(&self, other: &RegionSet) -> RegionSet {
        self.regions.union(&other.regions).copied().collect()
    }

    /// Square of regions with the given radius around `center` (radius 0 is just the center).
    pub fn square(center: RegionKey, radius: i32) -> Self {
        let radius = radius.max(0);
        let mut set = Self::new();
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                if let Some(key) = center.offset(dx, dz) {
                    set.insert(key);
                }
            }
        }
        set
    }
}

impl FromIterator<RegionKey> for RegionSet {
    fn from_iter<I: IntoIterator<Item = RegionKey>>(iter: I) -> Self {
        Self {
            regions: iter.into_iter().collect(),
        }
    }
}

impl Extend<RegionKey> for RegionSet {
    fn extend<I: IntoIterator<Item = RegionKey>>(&mut self, iter: I) {
        self.regions.extend(iter);
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a RegionKey;
    type IntoIter = btree_set::Iter<'a, RegionKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

impl IntoIterator for RegionSet {
    type Item = RegionKey;
    type IntoIter = btree_set::IntoIter<RegionKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.into_iter()
    }
}

impl fmt::Display for RegionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, key) in self.regions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn packing_layout_is_x_low_z_high() {
        assert_eq!(RegionKey::new(1, 0).pack(), 1);
        assert_eq!(RegionKey::new(0, 1).pack(), 1 << 32);
        assert_eq!(RegionKey::new(-1, 0).pack(), 0xFFFF_FFFF);
        assert_eq!(RegionKey::new(0, -1).pack(), -(1i64 << 32));
        assert_eq!(RegionKey::new(-1, -1).pack(), -1);
    }

    #[test]
    fn containing_uses_floor_division() {
        assert_eq!(RegionKey::containing(0, 15), RegionKey::new(0, 0));
        assert_eq!(RegionKey::containing(16, -1), RegionKey::new(1, -1));
        assert_eq!(RegionKey::containing(-16, -17), RegionKey::new(-1, -2));
    }

    #[test]
    fn set_iterates_sorted_and_dedups() {
        let set: RegionSet = [
            RegionKey::new(2, 0),
            RegionKey::new(0, 5),
            RegionKey::new(0, 1),
            RegionKey::new(2, 0),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 3);
        let order: Vec<_> = set.iter().copied().collect();
        assert_eq!(
            order,
            vec![RegionKey::new(0, 1), RegionKey::new(0, 5), RegionKey::new(2, 0)]
        );
        assert_eq!(set.to_string(), "{(0, 1), (0, 5), (2, 0)}");
    }

    #[test]
    fn square_covers_radius() {
        assert_eq!(RegionSet::square(RegionKey::new(3, 3), 0).len(), 1);
        let square = RegionSet::square(RegionKey::new(0, 0), 2);
        assert_eq!(square.len(), 25);
        assert!(square.contains(&RegionKey::new(-2, 2)));
        assert!(!square.contains(&RegionKey::new(3, 0)));
    }

    #[test]
    fn offset_stops_at_coordinate_limits() {
        assert_eq!(RegionKey::new(1, -1).offset(2, 3), Some(RegionKey::new(3, 2)));
        assert_eq!(RegionKey::new(i32::MAX, 0).offset(1, 0), None);
        assert_eq!(RegionKey::new(0, i32::MIN).offset(0, -1), None);
        assert_eq!(RegionSet::square(RegionKey::new(i32::MAX, 0), 1).len(), 6);
    }

    #[test]
    fn difference_and_union() {
        let a: RegionSet = [RegionKey::new(0, 0), RegionKey::new(1, 0)].into_iter().collect();
        let b: RegionSet = [RegionKey::new(1, 0), RegionKey::new(2, 0)].into_iter().collect();
        assert_eq!(a.difference(&b).collect::<Vec<_>>(), vec![RegionKey::new(0, 0)]);
        assert_eq!(b.difference(&a).collect::<Vec<_>>(), vec![RegionKey::new(2, 0)]);
        assert_eq!(a.union(&b).len(), 3);
    }

    proptest! {
        #[test]
        fn pack_unpack_is_exact(x in any::<i32>(), z in any::<i32>()) {
            let key = RegionKey::new(x, z);
            prop_assert_eq!(RegionKey::unpack(key.pack()), key);
        }

        #[test]
        fn every_packed_value_decodes_consistently(packed in any::<i64>()) {
            prop_assert_eq!(RegionKey::unpack(packed).pack(), packed);
        }
    }
}
