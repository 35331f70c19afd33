//! Save directory layout and file formats.
//!
//! ```text
//! <save_dir>/server.json          format version, tick, known worlds
//! <save_dir>/tickets.json         ticket registry
//! <save_dir>/levels/<world>.json  blocks of one world
//! ```
//!
//! The registry and the levels are written separately on purpose: after a
//! crash between the writes they disagree and world activation reconciles
//! them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chunkhold_core::WorldKey;
use serde::{Deserialize, Serialize};

use crate::level::BlockSave;

/// Current save format version.
pub const SAVE_VERSION: u16 = 1;

const META_FILE: &str = "server.json";
const TICKETS_FILE: &str = "tickets.json";
const LEVELS_DIR: &str = "levels";

/// Top-level save metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMeta {
    /// Format version the save was written with.
    pub version: u16,
    /// Wall-clock time of the write.
    pub saved_at: DateTime<Utc>,
    /// Simulation tick at save time.
    pub tick: u64,
    /// Worlds with a level file.
    pub worlds: Vec<WorldKey>,
}

/// One world's level file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelFile {
    /// World the blocks belong to.
    pub world: WorldKey,
    /// Wall-clock time of the write.
    pub saved_at: DateTime<Utc>,
    /// Blocks in position order.
    pub blocks: Vec<BlockSave>,
}

/// Path of the metadata file.
pub fn meta_path(dir: &Path) -> PathBuf {
    dir.join(META_FILE)
}

/// Path of the ticket registry file.
pub fn tickets_path(dir: &Path) -> PathBuf {
    dir.join(TICKETS_FILE)
}

/// Path of one world's level file.
pub fn level_path(dir: &Path, world: &WorldKey) -> PathBuf {
    dir.join(LEVELS_DIR).join(format!("{}.json", world.file_stem()))
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub(crate) fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to deserialize {}", path.display()))
}

pub(crate) fn read_meta(dir: &Path) -> Result<ServerMeta> {
    let meta: ServerMeta = read_json(&meta_path(dir))?;
    if meta.version != SAVE_VERSION {
        anyhow::bail!(
            "Unsupported save version in {}: expected {}, got {}",
            dir.display(),
            SAVE_VERSION,
            meta.version
        );
    }
    Ok(meta)
}
