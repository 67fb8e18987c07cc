// src/transcript/markers.rs
//
// Literal marker lines the firmware prints around its payloads, and the
// tracker a session uses to decide when a transcript is complete.

use std::fmt;

pub const BEGIN_DEVICES: &str = "= Begin Devices =";
pub const END_DEVICES: &str = "= End Devices =";
pub const BEGIN_MESH_GRAPH: &str = "= Mesh Graph =";
pub const END_MESH_GRAPH: &str = "= End Mesh Graph =";

/// Every marker that must be seen before a transcript counts as complete.
pub const REQUIRED_MARKERS: [&str; 4] = [BEGIN_DEVICES, END_DEVICES, BEGIN_MESH_GRAPH, END_MESH_GRAPH];

/// A payload block inside a transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    Devices,
    MeshGraph,
}

impl Section {
    /// Marker whose line precedes the section payload.
    pub fn open_marker(self) -> &'static str {
        match self {
            Section::Devices => BEGIN_DEVICES,
            Section::MeshGraph => BEGIN_MESH_GRAPH,
        }
    }

    pub fn close_marker(self) -> &'static str {
        match self {
            Section::Devices => END_DEVICES,
            Section::MeshGraph => END_MESH_GRAPH,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Devices => write!(f, "Devices"),
            Section::MeshGraph => write!(f, "Mesh Graph"),
        }
    }
}

/// Tracks which required markers have shown up so far.
///
/// Matching is substring containment, order is not checked, and a marker
/// stays found once seen.
#[derive(Clone, Debug)]
pub struct RequiredMarkers {
    markers: Vec<(String, bool)>,
}

impl RequiredMarkers {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(|m| (m.into(), false)).collect(),
        }
    }

    /// Check `line` against every still-missing marker.
    /// Returns how many markers this line newly satisfied.
    pub fn observe(&mut self, line: &str) -> usize {
        let mut newly_found = 0;
        for (marker, found) in self.markers.iter_mut().filter(|entry| !entry.1) {
            if line.contains(marker.as_str()) {
                *found = true;
                newly_found += 1;
            }
        }
        newly_found
    }

    pub fn is_complete(&self) -> bool {
        self.markers.iter().all(|(_, found)| *found)
    }

    pub fn missing(&self) -> Vec<&str> {
        self.markers
            .iter()
            .filter(|(_, found)| !found)
            .map(|(marker, _)| marker.as_str())
            .collect()
    }
}

impl Default for RequiredMarkers {
    fn default() -> Self {
        Self::new(REQUIRED_MARKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_match_in_any_order() {
        let mut markers = RequiredMarkers::default();

        markers.observe("[12:00] = End Mesh Graph = (3 nodes)");
        markers.observe("noise");
        markers.observe(">> = Begin Devices =");
        assert!(!markers.is_complete());
        assert_eq!(markers.missing(), vec![END_DEVICES, BEGIN_MESH_GRAPH]);

        markers.observe("= Mesh Graph =");
        markers.observe("= End Devices =");
        assert!(markers.is_complete());
    }

    #[test]
    fn test_end_mesh_marker_does_not_satisfy_open_marker() {
        let mut markers = RequiredMarkers::new([BEGIN_MESH_GRAPH]);
        assert_eq!(markers.observe(END_MESH_GRAPH), 0);
        assert!(!markers.is_complete());
    }

    #[test]
    fn test_one_line_can_satisfy_several_markers() {
        let mut markers = RequiredMarkers::new(["alpha", "beta", "gamma"]);
        assert_eq!(markers.observe("alpha beta"), 2);
        assert_eq!(markers.observe("alpha again"), 0);
        assert_eq!(markers.missing(), vec!["gamma"]);
    }

    #[test]
    fn test_empty_marker_set_is_complete() {
        let markers = RequiredMarkers::new(Vec::<String>::new());
        assert!(markers.is_complete());
    }

    #[test]
    fn test_section_markers() {
        assert_eq!(Section::Devices.open_marker(), BEGIN_DEVICES);
        assert_eq!(Section::MeshGraph.close_marker(), END_MESH_GRAPH);
        assert_eq!(Section::MeshGraph.to_string(), "Mesh Graph");
    }
}
