//! Viewer identities
//!
//! A viewer is a connected client that can be subscribed to objectives and
//! teams. The host assigns the numeric id; the display name doubles as the
//! viewer's entry when it is added to a team.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Host-assigned identifier of a connected viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub u32);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected viewer. Equality and hashing only consider the id.
#[derive(Debug, Clone)]
pub struct Viewer {
    id: ViewerId,
    name: String,
}

impl Viewer {
    pub fn new(id: ViewerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> ViewerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Viewer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Viewer {}

impl Hash for Viewer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
