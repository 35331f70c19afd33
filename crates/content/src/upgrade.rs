//! Machine upgrades.
//!
//! Only the anchor upgrade matters to chunk loading; the others exist so the
//! component behaves like a real slot with per-upgrade stack limits.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chunkhold_retention::TileRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ContentError, TileComponent, UpgradeError};

/// Record field holding installed upgrade counts.
pub const UPGRADES_FIELD: &str = "upgrades";

/// Kinds of upgrade a machine can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Upgrade {
    /// Lets the machine keep its surroundings loaded.
    Anchor,
    /// Faster operation.
    Speed,
    /// Lower energy use.
    Energy,
}

impl Upgrade {
    /// Every upgrade, in stable order.
    pub const ALL: [Upgrade; 3] = [Upgrade::Anchor, Upgrade::Speed, Upgrade::Energy];

    /// Stack limit per machine.
    pub const fn max_stack(self) -> u8 {
        match self {
            Upgrade::Anchor => 1,
            Upgrade::Speed | Upgrade::Energy => 8,
        }
    }

    /// Canonical key used in records and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Upgrade::Anchor => "anchor",
            Upgrade::Speed => "speed",
            Upgrade::Energy => "energy",
        }
    }
}

impl fmt::Display for Upgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upgrade slots of one machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeComponent {
    supported: BTreeSet<Upgrade>,
    installed: BTreeMap<Upgrade, u8>,
}

impl UpgradeComponent {
    /// Slots accepting the given upgrades.
    pub fn new(supported: impl IntoIterator<Item = Upgrade>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            installed: BTreeMap::new(),
        }
    }

    /// Machine without upgrade slots.
    pub fn unsupported() -> Self {
        Self::default()
    }

    /// Whether the machine has any upgrade slot.
    pub fn supports_upgrades(&self) -> bool {
        !self.supported.is_empty()
    }

    /// Whether `upgrade` fits this machine.
    pub fn supports(&self, upgrade: Upgrade) -> bool {
        self.supported.contains(&upgrade)
    }

    /// Installed count of `upgrade`.
    pub fn count(&self, upgrade: Upgrade) -> u8 {
        self.installed.get(&upgrade).copied().unwrap_or(0)
    }

    /// Whether at least one `upgrade` is installed.
    pub fn is_installed(&self, upgrade: Upgrade) -> bool {
        self.count(upgrade) > 0
    }

    /// Install up to `amount`; returns how many went in.
    pub fn install(&mut self, upgrade: Upgrade, amount: u8) -> Result<u8, UpgradeError> {
        if !self.supports(upgrade) {
            return Err(UpgradeError::Unsupported(upgrade));
        }
        let max = upgrade.max_stack();
        let current = self.count(upgrade);
        if current >= max {
            return Err(UpgradeError::Full { upgrade, max });
        }
        let added = amount.min(max - current);
        if added > 0 {
            self.installed.insert(upgrade, current + added);
        }
        Ok(added)
    }

    /// Remove up to `amount`; returns how many came out.
    pub fn remove(&mut self, upgrade: Upgrade, amount: u8) -> u8 {
        let current = self.count(upgrade);
        let removed = amount.min(current);
        if removed == current {
            self.installed.remove(&upgrade);
        } else {
            self.installed.insert(upgrade, current - removed);
        }
        removed
    }
}

impl TileComponent for UpgradeComponent {
    fn key(&self) -> &'static str {
        UPGRADES_FIELD
    }

    fn write(&self, record: &mut TileRecord) {
        if self.installed.is_empty() {
            record.remove(UPGRADES_FIELD);
            return;
        }
        let counts: Map<String, Value> = self
            .installed
            .iter()
            .map(|(upgrade, count)| (upgrade.as_str().to_string(), Value::from(*count)))
            .collect();
        record.insert(UPGRADES_FIELD.to_string(), Value::Object(counts));
    }

    fn read(&mut self, record: &TileRecord) -> Result<(), ContentError> {
        self.installed.clear();
        let Some(value) = record.get(UPGRADES_FIELD) else {
            return Ok(());
        };
        let counts: BTreeMap<String, u8> =
            serde_json::from_value(value.clone()).map_err(ContentError::Upgrades)?;
        for (name, count) in counts {
            let upgrade: Upgrade =
                serde_json::from_value(Value::String(name)).map_err(ContentError::Upgrades)?;
            if count > 0 {
                self.install(upgrade, count)?;
            }
        }
        Ok(())
    }
}
