// src/mesh/mod.rs
//
// Mesh model built from a transcript, plus the filtered view renderers consume.

pub mod device_id;
pub mod model;
pub mod view;

pub use device_id::{normalize_device_id, DEVICE_ID_WIDTH};
pub use model::{DeviceTable, EdgeRating, MeshGraph, MeshSnapshot, NamedEdge};
pub use view::{render_text, visible_edges, DisplayMode, Exclusions, VisibleEdge, LINK_THRESHOLD};
