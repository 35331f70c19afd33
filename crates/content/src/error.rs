use chunkhold_retention::RecordError;
use thiserror::Error;

use crate::Upgrade;

/// Failure installing an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpgradeError {
    /// The machine has no slot for this upgrade.
    #[error("machine does not accept {0} upgrades")]
    Unsupported(Upgrade),
    /// The slot already holds the maximum stack.
    #[error("{upgrade} upgrade slot is full (max {max})")]
    Full {
        /// Upgrade being installed.
        upgrade: Upgrade,
        /// Stack limit for that upgrade.
        max: u8,
    },
}

/// Failure restoring a machine from its record.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Retention field could not be decoded.
    #[error(transparent)]
    Record(#[from] RecordError),
    /// Upgrade field could not be decoded.
    #[error("malformed upgrades field: {0}")]
    Upgrades(#[source] serde_json::Error),
    /// Upgrade field names upgrades the machine cannot hold.
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),
}
