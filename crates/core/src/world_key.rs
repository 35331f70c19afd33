//! Namespaced world identifiers.
//!
//! Tickets are indexed by the world they were issued in, so every anchor
//! carries a `WorldKey` (e.g. `chunkhold:overworld`). Keys are ordered and
//! validated to support deterministic iteration and stable persistence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default namespace used when a key omits an explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "chunkhold";

/// Error returned when parsing an invalid [`WorldKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldKeyError {
    /// The input was empty or whitespace.
    #[error("world key cannot be empty")]
    Empty,
    /// The namespace part is missing, too long, or contains invalid characters.
    #[error("invalid world key namespace `{0}` (allowed: a-z0-9_.-, max 64)")]
    Namespace(String),
    /// The path part is missing, too long, or contains invalid characters.
    #[error("invalid world key path `{0}` (allowed: a-z0-9_./-, max 128)")]
    Path(String),
}

/// A namespaced world key of the form `namespace:path`.
///
/// Ordering is lexical by `(namespace, path)` and is stable across runs.
/// Serializes as the display string so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorldKey {
    namespace: String,
    path: String,
}

impl WorldKey {
    /// Parse a world key.
    ///
    /// Accepts either:
    /// - `namespace:path`
    /// - `path` (uses [`DEFAULT_NAMESPACE`])
    pub fn parse(input: &str) -> Result<Self, WorldKeyError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WorldKeyError::Empty);
        }

        let (namespace, path) = match input.split_once(':') {
            Some((ns, p)) => (ns.trim(), p.trim()),
            None => (DEFAULT_NAMESPACE, input),
        };

        validate_namespace(namespace)?;
        validate_path(path)?;

        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// The primary world every host starts with.
    pub fn overworld() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            path: "overworld".to_string(),
        }
    }

    /// World key namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// World key path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File-system friendly name, `namespace+path` with `/` written as `~`.
    ///
    /// Neither separator is allowed inside a key, so distinct keys never
    /// share a stem.
    pub fn file_stem(&self) -> String {
        format!("{}+{}", self.namespace, self.path.replace('/', "~"))
    }
}

impl fmt::Display for WorldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for WorldKey {
    type Err = WorldKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WorldKey {
    type Error = WorldKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WorldKey> for String {
    fn from(key: WorldKey) -> Self {
        key.to_string()
    }
}

fn validate_namespace(ns: &str) -> Result<(), WorldKeyError> {
    let valid = !ns.is_empty()
        && ns.len() <= 64
        && ns
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(WorldKeyError::Namespace(ns.to_string()))
    }
}

fn validate_path(path: &str) -> Result<(), WorldKeyError> {
    let valid = !path.is_empty()
        && path.len() <= 128
        && path
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.' | '/'));
    if valid {
        Ok(())
    } else {
        Err(WorldKeyError::Path(path.to_string()))
    }
}
