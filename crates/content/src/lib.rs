#![warn(missing_docs)]
//! Chunk-loading machines built on the retention component.

mod error;
mod machine;
mod settings;
mod tile;
mod upgrade;

pub use error::{ContentError, UpgradeError};
pub use machine::{Machine, MachineKind, MachineSave, MachineView};
pub use settings::RetentionSettings;
pub use tile::{Components, TileComponent};
pub use upgrade::{Upgrade, UpgradeComponent, UPGRADES_FIELD};
