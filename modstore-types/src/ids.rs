//! Entity addressing.
//!
//! Users and worlds are keyed by UUID; the global record is a singleton.
//! Keys render as `user:<uuid>`, `world:<uuid>` and `general` so they can be
//! used as JSON object keys in aggregate documents.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const USER_PREFIX: &str = "user:";
const WORLD_PREFIX: &str = "world:";
const GENERAL: &str = "general";

/// Identifies one owner of persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EntityKey {
    /// A player, keyed by account UUID.
    User(Uuid),
    /// A world, keyed by world UUID.
    World(Uuid),
    /// The single process-wide record.
    General,
}

impl EntityKey {
    /// Creates a key for a fresh random user.
    #[must_use]
    pub fn new_user() -> Self {
        Self::User(Uuid::new_v4())
    }

    /// Creates a key for a fresh random world.
    #[must_use]
    pub fn new_world() -> Self {
        Self::World(Uuid::new_v4())
    }

    /// Returns the UUID for user and world keys.
    #[must_use]
    pub const fn uuid(&self) -> Option<Uuid> {
        match self {
            Self::User(id) | Self::World(id) => Some(*id),
            Self::General => None,
        }
    }

    /// Short kind label (`user`, `world`, `general`).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::World(_) => "world",
            Self::General => GENERAL,
        }
    }

    /// Parses a key from its display form.
    pub fn parse(s: &str) -> Result<Self, Error> {
        s.parse()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{USER_PREFIX}{id}"),
            Self::World(id) => write!(f, "{WORLD_PREFIX}{id}"),
            Self::General => f.write_str(GENERAL),
        }
    }
}

impl FromStr for EntityKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == GENERAL {
            return Ok(Self::General);
        }
        if let Some(rest) = s.strip_prefix(USER_PREFIX) {
            return Ok(Self::User(Uuid::parse_str(rest)?));
        }
        if let Some(rest) = s.strip_prefix(WORLD_PREFIX) {
            return Ok(Self::World(Uuid::parse_str(rest)?));
        }
        Err(Error::InvalidKey(s.to_string()))
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for EntityKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
