//! Recursive zoomable layout: one force simulation per visible module, composed under a
//! single global pan/zoom.

mod coordinator;
mod engine;
pub mod geometry;
pub mod lod;
pub mod physics;
mod style;
mod transform;

pub use coordinator::Coordinator;
pub use engine::{LayoutEngine, LayoutEvent, LayoutState, LinkElement, NodeElement};
pub use geometry::{LinkEnds, LinkPath, LinkShape, render_directed_link, render_undirected_link};
pub use style::{FlowStyle, RenderStyle, blend_color};
pub use transform::{LocalTransform, Transform};
