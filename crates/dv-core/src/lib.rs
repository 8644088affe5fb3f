pub mod config;
pub mod diagram;
pub mod error;
pub mod geometry;
pub mod id;
pub mod layers;
pub mod model;
pub mod transform;
pub mod validate;

pub use config::{Background, ViewportConfig};
pub use diagram::{BrokenConnection, Diagram, Removal, RemovedShape};
pub use error::CoreError;
pub use geometry::{Point, PointF, Rect, Size, union_all};
pub use id::{ControlPointId, LayerId, LayerIds, ShapeId};
pub use layers::{LayerVisibility, VisibleLayers};
pub use model::*;
pub use transform::{MAX_ZOOM_LEVEL, MIN_ZOOM_FACTOR, Transform, snap_to_grid};
pub use validate::{Diagnostic, Severity, validate_diagram};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
