use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One tier of the organizational hierarchy, ordered from the root down.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LevelKind {
    Cluster,
    Region,
    Area,
    Branch,
}

impl LevelKind {
    pub const ALL: [LevelKind; 4] = [
        LevelKind::Cluster,
        LevelKind::Region,
        LevelKind::Area,
        LevelKind::Branch,
    ];

    pub const COUNT: usize = 4;

    /// Distance from the root level (Cluster = 0).
    pub fn depth(self) -> usize {
        match self {
            LevelKind::Cluster => 0,
            LevelKind::Region => 1,
            LevelKind::Area => 2,
            LevelKind::Branch => 3,
        }
    }

    pub fn is_ancestor_of(self, other: LevelKind) -> bool {
        self.depth() < other.depth()
    }

    /// Lowercased name, as used for request field prefixes.
    pub fn as_str(self) -> &'static str {
        match self {
            LevelKind::Cluster => "cluster",
            LevelKind::Region => "region",
            LevelKind::Area => "area",
            LevelKind::Branch => "branch",
        }
    }

    pub fn ancestors(self) -> impl Iterator<Item = LevelKind> {
        LevelKind::ALL.into_iter().filter(move |l| l.is_ancestor_of(self))
    }

    pub fn descendants(self) -> impl Iterator<Item = LevelKind> {
        LevelKind::ALL.into_iter().filter(move |l| self.is_ancestor_of(*l))
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cluster" => Ok(LevelKind::Cluster),
            "region" => Ok(LevelKind::Region),
            "area" => Ok(LevelKind::Area),
            "branch" => Ok(LevelKind::Branch),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// A single organizational or location node.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Entity {
    pub id: String,
    pub label: String,
    pub level: LevelKind,
    pub parent_id: Option<String>,
}

impl Entity {
    pub fn create(id: impl Into<String>, label: impl Into<String>, level: LevelKind) -> Self {
        Entity {
            id: id.into(),
            label: label.into(),
            level,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A flat option on the status axis (employee status, application status).
///
/// Status options are never narrowed by location selections.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct StatusOption {
    pub id: String,
    pub label: String,
}
