//! Identifiers shared across the scheduling core.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identity of a client job, carrying its split lineage explicitly.
///
/// The logical part is assigned by the routing collaborator. Siblings produced by
/// dividing an oversized request share the logical part and are distinguished by
/// `split_index` out of `split_count`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId {
    pub logical: String,
    pub split_index: u32,
    pub split_count: u32,
}

impl JobId {
    /// Creates the identity of an unsplit job.
    pub fn new(logical: &str) -> Self {
        Self {
            logical: logical.to_string(),
            split_index: 0,
            split_count: 1,
        }
    }

    /// Creates the identity of one sibling of a split job.
    pub fn part(logical: &str, split_index: u32, split_count: u32) -> Self {
        Self {
            logical: logical.to_string(),
            split_index,
            split_count,
        }
    }

    /// Returns true if this id belongs to a sibling of a split job.
    pub fn is_split(&self) -> bool {
        self.split_count > 1
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new("")
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.is_split() {
            write!(f, "{}-{}", self.logical, self.split_index)
        } else {
            write!(f, "{}", self.logical)
        }
    }
}

/// Address of one disk in the resource catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub server_id: String,
    pub node_idx: u32,
    pub disk_idx: u32,
}

impl Placement {
    pub fn new(server_id: &str, node_idx: u32, disk_idx: u32) -> Self {
        Self {
            server_id: server_id.to_string(),
            node_idx,
            disk_idx,
        }
    }
}

impl Display for Placement {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.server_id, self.node_idx, self.disk_idx)
    }
}
