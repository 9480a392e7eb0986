//! Scene-side collaborators of the tile streaming core: camera state and
//! frustum culling, the scene graph interface tiles are attached through, and
//! an in-memory scene tree with click bubbling.

mod camera;
mod click;
mod frustum;
mod graph;

pub use camera::CameraState;
pub use click::{ClickEvent, Clickable, Propagation};
pub use frustum::Frustum;
pub use graph::{NodeId, NodeKind, SceneGraph, SceneNode, SceneTree};
