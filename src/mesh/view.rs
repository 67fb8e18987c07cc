// src/mesh/view.rs
//
// What a renderer actually draws: one rating channel, hidden devices removed,
// weak links dropped. Colouring and layout are left to the renderer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use super::model::MeshSnapshot;

/// Ratings at or below this never count as a link. A rating of at least 5
/// means the two devices have been in range at some point.
pub const LINK_THRESHOLD: f64 = 5.0;

/// Which rating channel to show.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Direct,
    Indirect,
}

/// Device display names the operator asked to hide.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Exclusions {
    names: BTreeSet<String>,
}

impl Exclusions {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// One name per line; surrounding whitespace and blank lines are ignored.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().map(str::trim).filter(|l| !l.is_empty()))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read exclusions file {}: {}", path.display(), e))?;
        let exclusions = Self::parse(&content);
        tlog!(
            "[view] Excluding {} devices: {:?}",
            exclusions.names.len(),
            exclusions.names
        );
        Ok(exclusions)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// An edge that survived filtering, labelled by device names.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisibleEdge {
    pub from: String,
    pub to: String,
    pub weight: f64,
    pub mode: DisplayMode,
}

/// Edges to draw for `mode`.
///
/// An entry is kept when both endpoints have a name that is not excluded, the
/// names differ, and the selected channel's rating is above `LINK_THRESHOLD`.
pub fn visible_edges(snapshot: &MeshSnapshot, mode: DisplayMode, exclusions: &Exclusions) -> Vec<VisibleEdge> {
    snapshot
        .edges()
        .filter_map(|edge| {
            let from = visible_name(edge.source_name, exclusions)?;
            let to = visible_name(edge.neighbor_name, exclusions)?;
            if from == to {
                return None;
            }

            let weight = match mode {
                DisplayMode::Direct => edge.rating.direct,
                DisplayMode::Indirect => edge.rating.indirect,
            };
            (weight > LINK_THRESHOLD).then(|| VisibleEdge {
                from: from.to_string(),
                to: to.to_string(),
                weight,
                mode,
            })
        })
        .collect()
}

/// Plain-text listing of the device table and the given edges.
pub fn render_text(snapshot: &MeshSnapshot, edges: &[VisibleEdge]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Devices ({}):", snapshot.device_table().len());
    for (id, name) in snapshot.device_table().iter() {
        let _ = writeln!(out, "  {:>5}  {}", id, name);
    }

    let unnamed = snapshot.unnamed_devices();
    if !unnamed.is_empty() {
        let _ = writeln!(out, "Unnamed in graph: {}", unnamed.join(", "));
    }

    let _ = writeln!(out, "Links ({}):", edges.len());
    for edge in edges {
        let _ = writeln!(out, "  {} -> {}  {}", edge.from, edge.to, edge.weight);
    }
    out
}

/// A resolved name, unless the operator hid it.
fn visible_name<'a>(name: Option<&'a str>, exclusions: &Exclusions) -> Option<&'a str> {
    name.filter(|n| !exclusions.contains(n))
}
