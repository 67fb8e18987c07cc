// src/mesh/model.rs
//
// Typed snapshot of one transcript: which devices exist and how well each
// pair hears each other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::device_id::{lookup_candidates, normalize_device_id};

// ============================================================================
// Edge Rating
// ============================================================================

/// Link quality from one device to one neighbor.
///
/// `direct` and `indirect` are independent rating channels of the same
/// directed edge, not two edges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRating {
    pub direct: f64,
    pub indirect: f64,
}

// ============================================================================
// Device Table
// ============================================================================

/// Normalized device ID -> display name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeviceTable {
    names: BTreeMap<String, String>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. The ID is normalized; a later entry for the same
    /// normalized ID replaces the earlier one.
    pub fn insert(&mut self, id: &str, name: impl Into<String>) -> Option<String> {
        self.names.insert(normalize_device_id(id), name.into())
    }

    /// Name for a device reference, trying the raw form first and then the
    /// zero-padded form. `None` when neither is known.
    pub fn lookup(&self, id: &str) -> Option<&str> {
        lookup_candidates(id).find_map(|candidate| self.names.get(&candidate).map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(id, name)| (id.as_str(), name.as_str()))
    }
}

// ============================================================================
// Mesh Graph
// ============================================================================

/// Source device ID -> neighbor device ID -> rating, exactly as reported.
///
/// Directed: `a -> b` and `b -> a` are separate entries with their own
/// ratings. IDs are kept in whatever form the firmware used.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeshGraph {
    adjacency: BTreeMap<String, BTreeMap<String, EdgeRating>>,
}

impl MeshGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &str, neighbor: &str, rating: EdgeRating) -> Option<EdgeRating> {
        self.adjacency
            .entry(source.to_string())
            .or_default()
            .insert(neighbor.to_string(), rating)
    }

    pub fn rating(&self, source: &str, neighbor: &str) -> Option<EdgeRating> {
        self.adjacency.get(source)?.get(neighbor).copied()
    }

    pub fn neighbors(&self, source: &str) -> Option<&BTreeMap<String, EdgeRating>> {
        self.adjacency.get(source)
    }

    /// Every source ID, including sources with no neighbors.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    /// Every directed entry as `(source, neighbor, rating)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, EdgeRating)> {
        self.adjacency.iter().flat_map(|(source, neighbors)| {
            neighbors
                .iter()
                .map(move |(neighbor, rating)| (source.as_str(), neighbor.as_str(), *rating))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// A directed edge with both endpoints resolved against the device table.
/// A `None` name means the ID has no device table entry.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedEdge<'a> {
    pub source: &'a str,
    pub neighbor: &'a str,
    pub source_name: Option<&'a str>,
    pub neighbor_name: Option<&'a str>,
    pub rating: EdgeRating,
}

impl NamedEdge<'_> {
    pub fn is_fully_named(&self) -> bool {
        self.source_name.is_some() && self.neighbor_name.is_some()
    }
}

/// Device table and mesh graph parsed from one transcript. Read-only.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MeshSnapshot {
    devices: DeviceTable,
    graph: MeshGraph,
}

impl MeshSnapshot {
    pub fn new(devices: DeviceTable, graph: MeshGraph) -> Self {
        Self { devices, graph }
    }

    pub fn device_table(&self) -> &DeviceTable {
        &self.devices
    }

    pub fn mesh_graph(&self) -> &MeshGraph {
        &self.graph
    }

    /// Name for a device reference, logging a miss.
    pub fn device_name(&self, id: &str) -> Option<&str> {
        let name = self.devices.lookup(id);
        if name.is_none() {
            tlog!("[mesh] Device {} not found in device names", id);
        }
        name
    }

    /// Every graph entry with names resolved.
    pub fn edges(&self) -> impl Iterator<Item = NamedEdge<'_>> {
        let devices = &self.devices;
        self.graph.edges().map(move |(source, neighbor, rating)| NamedEdge {
            source,
            neighbor,
            source_name: devices.lookup(source),
            neighbor_name: devices.lookup(neighbor),
            rating,
        })
    }

    /// IDs referenced by the graph that the device table cannot name.
    pub fn unnamed_devices(&self) -> Vec<&str> {
        let mut missing: Vec<&str> = self
            .graph
            .edges()
            .flat_map(|(source, neighbor, _)| [source, neighbor])
            .chain(self.graph.sources())
            .filter(|id| self.devices.lookup(id).is_none())
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}
