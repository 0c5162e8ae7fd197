//! Shared types used across Strata crates.
//!
//! These mirror the shapes handed down by the container orchestrator
//! (topology segments and requirements) and the few backend entities the
//! scheduler consumes. All of them are request-scoped values.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque name of a volume (resource definition) inside the storage backend.
///
/// Supplied by the caller; the scheduler never generates one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeHandle(String);

impl VolumeHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VolumeHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VolumeHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A volume as handed to a scheduler: its handle plus raw parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub id: VolumeHandle,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl VolumeInfo {
    pub fn new(id: impl Into<VolumeHandle>) -> Self {
        Self {
            id: id.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// One topology zone: topology key → topology value.
///
/// Keys are unique and their order carries no meaning. Backed by a
/// `BTreeMap` so iteration (and anything derived from it, such as backend
/// property filters) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Segment(BTreeMap<String, String>);

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segment naming a single node under the given node-identity key.
    pub fn for_node(node_key: &str, node: impl Into<String>) -> Self {
        let mut segment = Self::new();
        segment.insert(node_key, node);
        segment
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Accessibility constraints for a new volume.
///
/// `preferred` is ordered by preference. `requisite`, when non-empty,
/// restricts placement to the listed zones. The orchestrator guarantees
/// every preferred segment also appears in `requisite` when both are set;
/// this is not checked here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyRequirement {
    #[serde(default)]
    pub preferred: Vec<Segment>,
    #[serde(default)]
    pub requisite: Vec<Segment>,
}

impl TopologyRequirement {
    pub fn is_unconstrained(&self) -> bool {
        self.preferred.is_empty() && self.requisite.is_empty()
    }
}

/// A storage node as reported by the backend.
///
/// The scheduler only consumes `name`; `properties` is what aux filters
/// are matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}
