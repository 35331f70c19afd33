use serde::{Deserialize, Serialize};

/// Server-wide chunk loading rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// Master switch; when off no machine is eligible to hold tickets.
    pub allow_chunk_loading: bool,
    /// Largest radius (in regions) a stabilizer may keep loaded around itself.
    pub max_stabilizer_radius: i32,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            allow_chunk_loading: true,
            max_stabilizer_radius: 2,
        }
    }
}
